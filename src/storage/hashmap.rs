//! In-memory hashmap backend
//!
//! Records live in a `HashMap` behind one reader/writer lock. Queries
//! snapshot the matching candidates under the read lock and stream them
//! from a spawned task, so no lock is ever held while a consumer is
//! being waited on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::config::EngineConfig;
use crate::database::{
    BatchWriter, Context, Database, DbError, DbResult, Finisher, QueryRunner, RecordIterator,
    Subscription, SubscriptionPlugin,
};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, MetricsSnapshot};
use crate::query::Query;
use crate::record::{DeletedRecord, Format, Record, RecordRef};

/// Hashmap-backed database
pub struct HashMapDb {
    name: String,
    config: EngineConfig,
    records: RwLock<HashMap<String, RecordRef>>,
    subscriptions: SubscriptionPlugin,
    runners: Mutex<Vec<Finisher>>,
    stopped: AtomicBool,
    lifecycle: Mutex<Context>,
    metrics: Arc<MetricsRegistry>,
}

impl HashMapDb {
    /// Create a stopped backend
    pub fn new(name: impl Into<String>, config: EngineConfig) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let subscriptions =
            SubscriptionPlugin::new(config.subscription_timeout()).with_metrics(metrics.clone());

        Self {
            name: name.into(),
            config,
            records: RwLock::new(HashMap::new()),
            subscriptions,
            runners: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(true),
            lifecycle: Mutex::new(Context::new()),
            metrics,
        }
    }

    /// Create and start a backend with default configuration
    pub async fn started(name: impl Into<String>) -> DbResult<Self> {
        let db = Self::new(name, EngineConfig::default());
        db.start().await?;
        Ok(db)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Counter values for this backend
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn ensure_running(&self) -> DbResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(DbError::Stopped);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> DbResult<()> {
        self.ensure_running()?;
        if self.config.read_only {
            return Err(DbError::ReadOnly);
        }
        Ok(())
    }

    fn lifecycle_ctx(&self) -> Context {
        match self.lifecycle.lock() {
            Ok(ctx) => ctx.clone(),
            Err(_) => {
                let ctx = Context::new();
                ctx.cancel();
                ctx
            }
        }
    }

    fn track_runner(&self, finisher: Finisher) {
        if let Ok(mut runners) = self.runners.lock() {
            runners.retain(|f| !f.is_finished());
            runners.push(finisher);
        }
    }

    /// Tell subscribers about a write or deletion
    async fn notify(&self, record: &RecordRef) {
        let ctx = self.lifecycle_ctx();
        self.subscriptions.submit(&ctx, record).await;
    }

    fn store(&self, record: RecordRef) -> DbResult<()> {
        validate(record.as_ref())?;
        let mut records = self.records.write().map_err(|_| DbError::Stopped)?;
        records.insert(record.key().to_string(), record);
        Ok(())
    }
}

/// Reject records that cannot be stored
fn validate(record: &dyn Record) -> DbResult<()> {
    if record.is_deleted() {
        return Err(DbError::invalid_record("tombstones cannot be stored"));
    }
    if record.key().is_empty() {
        return Err(DbError::invalid_record("empty key"));
    }
    if record.format() == Format::Auto {
        return Err(DbError::invalid_record(format!(
            "record {} has no format",
            record.key()
        )));
    }
    let has_data = record.data().is_some_and(|d| !d.is_empty());
    if record.object().is_none() && !has_data {
        return Err(DbError::invalid_record(format!(
            "record {} has no payload",
            record.key()
        )));
    }
    Ok(())
}

#[async_trait]
impl Database for HashMapDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_only(&self) -> bool {
        self.config.read_only
    }

    async fn start(&self) -> DbResult<()> {
        if let Ok(mut ctx) = self.lifecycle.lock() {
            if ctx.is_cancelled() {
                *ctx = Context::new();
            }
        }
        self.stopped.store(false, Ordering::Release);
        log_event_with_fields(Event::DatabaseStart, &[("name", self.name.as_str())]);
        Ok(())
    }

    async fn stop(&self) -> DbResult<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.lifecycle_ctx().cancel();
        let runners: Vec<Finisher> = match self.runners.lock() {
            Ok(mut runners) => runners.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for runner in runners {
            runner.finish(Some(DbError::ShuttingDown));
        }
        self.subscriptions.finish_all(Some(DbError::ShuttingDown));
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }

        log_event_with_fields(Event::DatabaseStop, &[("name", self.name.as_str())]);
        Ok(())
    }

    async fn exists(&self, key: &str) -> DbResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(DbError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Expired records read as absent until maintenance removes them
    async fn get(&self, key: &str) -> DbResult<RecordRef> {
        self.ensure_running()?;
        let records = self.records.read().map_err(|_| DbError::Stopped)?;
        records
            .get(key)
            .filter(|r| r.is_valid_at(Utc::now()))
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn put(&self, record: RecordRef) -> DbResult<()> {
        self.ensure_writable()?;
        self.store(record.clone())?;
        self.metrics.increment_puts();
        self.notify(&record).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> DbResult<()> {
        self.ensure_writable()?;
        let removed = {
            let mut records = self.records.write().map_err(|_| DbError::Stopped)?;
            records.remove(key).ok_or(DbError::NotFound)?
        };
        self.metrics.increment_deletes();
        let tombstone = DeletedRecord::of(removed.as_ref()).into_ref();
        self.notify(&tombstone).await;
        Ok(())
    }

    async fn batch_put<'a>(&'a self) -> DbResult<Box<dyn BatchWriter + 'a>> {
        self.ensure_writable()?;
        Ok(Box::new(HashMapBatch { db: self, written: 0 }))
    }

    async fn batch_delete(&self, query: Query) -> DbResult<usize> {
        self.ensure_writable()?;
        let query = query.checked()?;

        let removed: Vec<RecordRef> = {
            let mut records = self.records.write().map_err(|_| DbError::Stopped)?;
            let keys: Vec<String> = records
                .values()
                .filter(|r| query.matches(r.as_ref()))
                .map(|r| r.key().to_string())
                .collect();
            keys.iter().filter_map(|k| records.remove(k)).collect()
        };

        for record in &removed {
            self.metrics.increment_deletes();
            let tombstone = DeletedRecord::of(record.as_ref()).into_ref();
            self.notify(&tombstone).await;
        }
        Ok(removed.len())
    }

    async fn maintain(&self, ctx: &Context) -> DbResult<usize> {
        self.ensure_writable()?;
        let now = Utc::now();

        let mut purged = 0;
        {
            let mut records = self.records.write().map_err(|_| DbError::Stopped)?;
            let expired: Vec<String> = records
                .values()
                .filter(|r| !r.is_valid_at(now))
                .map(|r| r.key().to_string())
                .collect();
            for key in expired {
                if ctx.is_cancelled() {
                    break;
                }
                records.remove(&key);
                purged += 1;
            }
        }

        for _ in 0..purged {
            self.metrics.increment_deletes();
        }
        if purged > 0 {
            let count = purged.to_string();
            log_event_with_fields(
                Event::RecordsPurged,
                &[("count", count.as_str()), ("name", self.name.as_str())],
            );
        }
        Ok(purged)
    }

    async fn query_with_context(
        &self,
        ctx: &Context,
        query: Query,
        queue_size: usize,
    ) -> DbResult<RecordIterator> {
        self.ensure_running()?;
        let (runner, iter) = QueryRunner::new(query, queue_size, self.config.query_timeout())?;
        let mut runner = runner.with_metrics(self.metrics.clone());

        let candidates: Vec<RecordRef> = {
            let records = self.records.read().map_err(|_| DbError::Stopped)?;
            records
                .iter()
                .filter(|(key, _)| runner.query().matches_key(key))
                .map(|(_, r)| r.clone())
                .collect()
        };

        self.track_runner(runner.finisher());
        let query_text = runner.query().print();
        log_event_with_fields(Event::QueryStart, &[("query", query_text.as_str())]);

        let ctx = ctx.clone();
        tokio::spawn(async move {
            for record in candidates {
                if runner.submit(&ctx, record).await {
                    break;
                }
            }
            runner.finish(None);
        });

        Ok(iter)
    }

    async fn subscribe(&self, query: Query, queue_size: usize) -> DbResult<Subscription> {
        self.ensure_running()?;
        self.subscriptions.subscribe(query, queue_size)
    }
}

impl std::fmt::Debug for HashMapDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashMapDb")
            .field("name", &self.name)
            .field("records", &self.len())
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}

/// Batch writer that puts records one by one
struct HashMapBatch<'a> {
    db: &'a HashMapDb,
    written: usize,
}

#[async_trait]
impl BatchWriter for HashMapBatch<'_> {
    async fn put(&mut self, record: RecordRef) -> DbResult<()> {
        self.db.put(record).await?;
        self.written += 1;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> DbResult<usize> {
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Expiry, MemRecord, Permission};
    use serde_json::json;

    fn expired(key: &str) -> RecordRef {
        MemRecord::new(key, Permission::ANYONE)
            .with_object(json!({"S": "old"}))
            .with_expiry(Expiry::At(Utc::now() - chrono::Duration::seconds(5)))
            .into_ref()
    }

    fn rec(key: &str) -> RecordRef {
        MemRecord::new(key, Permission::ANYONE)
            .with_object(json!({"S": "banana", "I": 42}))
            .into_ref()
    }

    #[tokio::test]
    async fn test_new_backend_is_stopped() {
        let db = HashMapDb::new("test", EngineConfig::default());
        assert_eq!(db.get("a").await.unwrap_err(), DbError::Stopped);
        assert_eq!(db.put(rec("a")).await.unwrap_err(), DbError::Stopped);

        db.start().await.unwrap();
        db.put(rec("a")).await.unwrap();
        assert!(db.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_clears_and_rejects() {
        let db = HashMapDb::started("test").await.unwrap();
        db.put(rec("a")).await.unwrap();
        db.stop().await.unwrap();
        db.stop().await.unwrap();

        assert_eq!(db.exists("a").await.unwrap_err(), DbError::Stopped);
        assert!(matches!(
            db.query(Query::new(""), 1).await.unwrap_err(),
            DbError::Stopped
        ));
        assert!(db.is_empty());

        db.start().await.unwrap();
        assert!(!db.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_finishes_subscriptions() {
        let db = HashMapDb::started("test").await.unwrap();
        let sub = db.subscribe(Query::new(""), 1).await.unwrap();
        db.stop().await.unwrap();
        assert_eq!(sub.err(), Some(DbError::ShuttingDown));
        assert_eq!(db.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_records_rejected() {
        let db = HashMapDb::started("test").await.unwrap();

        let no_format = MemRecord::new("a", Permission::ANYONE).into_ref();
        assert!(matches!(
            db.put(no_format).await.unwrap_err(),
            DbError::InvalidRecord(_)
        ));

        let empty = MemRecord::new("a", Permission::ANYONE)
            .with_data(Format::Json, Vec::new())
            .into_ref();
        assert!(matches!(db.put(empty).await.unwrap_err(), DbError::InvalidRecord(_)));

        let tombstone = DeletedRecord::of(rec("a").as_ref()).into_ref();
        assert!(matches!(
            db.put(tombstone).await.unwrap_err(),
            DbError::InvalidRecord(_)
        ));

        let bytes = MemRecord::new("b", Permission::ANYONE)
            .with_data(Format::Bytes, vec![1, 2, 3])
            .into_ref();
        db.put(bytes).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let db = HashMapDb::new("ro", EngineConfig::default().with_read_only());
        db.start().await.unwrap();

        assert_eq!(db.put(rec("a")).await.unwrap_err(), DbError::ReadOnly);
        assert_eq!(db.delete("a").await.unwrap_err(), DbError::ReadOnly);
        assert_eq!(
            db.batch_delete(Query::new("")).await.unwrap_err(),
            DbError::ReadOnly
        );
        assert!(matches!(db.batch_put().await, Err(DbError::ReadOnly)));
        assert!(!db.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_key() {
        let db = HashMapDb::started("test").await.unwrap();
        assert_eq!(db.delete("nope").await.unwrap_err(), DbError::NotFound);
    }

    #[tokio::test]
    async fn test_expired_records_read_as_absent() {
        let db = HashMapDb::started("test").await.unwrap();
        db.put(expired("old")).await.unwrap();
        db.put(rec("new")).await.unwrap();

        assert_eq!(db.get("old").await.unwrap_err(), DbError::NotFound);
        assert!(!db.exists("old").await.unwrap());
        assert_eq!(db.len(), 2);

        let (records, _) = db.query(Query::new(""), 10).await.unwrap().collect().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), "new");
    }

    #[tokio::test]
    async fn test_maintain_purges_expired() {
        let db = HashMapDb::started("test").await.unwrap();
        db.put(expired("a")).await.unwrap();
        db.put(expired("b")).await.unwrap();
        db.put(rec("c")).await.unwrap();

        assert_eq!(db.maintain(&Context::new()).await.unwrap(), 2);
        assert_eq!(db.len(), 1);
        assert_eq!(db.maintain(&Context::new()).await.unwrap(), 0);
        assert_eq!(db.metrics().deletes, 2);
    }

    #[tokio::test]
    async fn test_maintain_stops_when_cancelled() {
        let db = HashMapDb::started("test").await.unwrap();
        db.put(expired("a")).await.unwrap();

        let ctx = Context::new();
        ctx.cancel();
        assert_eq!(db.maintain(&ctx).await.unwrap(), 0);
        assert_eq!(db.len(), 1);

        let ro = HashMapDb::new("ro", EngineConfig::default().with_read_only());
        ro.start().await.unwrap();
        assert_eq!(ro.maintain(&Context::new()).await.unwrap_err(), DbError::ReadOnly);
    }

    #[tokio::test]
    async fn test_batch_put() {
        let db = HashMapDb::started("test").await.unwrap();
        let mut batch = db.batch_put().await.unwrap();
        for key in ["a", "b", "c"] {
            batch.put(rec(key)).await.unwrap();
        }
        assert_eq!(batch.finish().await.unwrap(), 3);
        assert_eq!(db.len(), 3);
        assert_eq!(db.metrics().puts, 3);
    }

    #[tokio::test]
    async fn test_batch_delete_notifies_each() {
        let db = HashMapDb::started("test").await.unwrap();
        for key in ["x/a", "x/b", "y/c"] {
            db.put(rec(key)).await.unwrap();
        }
        let mut sub = db.subscribe(Query::new("x/"), 10).await.unwrap();

        let count = db.batch_delete(Query::new("x/")).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(db.len(), 1);

        let mut deleted = Vec::new();
        for _ in 0..2 {
            let r = sub.next().await.unwrap();
            assert!(r.is_deleted());
            deleted.push(r.key().to_string());
        }
        deleted.sort();
        assert_eq!(deleted, vec!["x/a", "x/b"]);
    }

    #[tokio::test]
    async fn test_batch_delete_rejects_invalid_query() {
        use crate::query::{Condition, Operator};

        let db = HashMapDb::started("test").await.unwrap();
        db.put(rec("a")).await.unwrap();
        let q = Query::new("").with_condition(Condition::field("I", Operator::Equals, "x"));
        assert!(matches!(
            db.batch_delete(q).await.unwrap_err(),
            DbError::InvalidQuery(_)
        ));
        assert_eq!(db.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_ends_running_query() {
        let db = HashMapDb::started("test").await.unwrap();
        for i in 0..5 {
            db.put(rec(&format!("k/{}", i))).await.unwrap();
        }

        // queue of one and no reader keeps the runner blocked on the second record
        let mut iter = db.query(Query::new("k/"), 1).await.unwrap();
        tokio::task::yield_now().await;
        db.stop().await.unwrap();

        while iter.next().await.is_some() {}
        assert_eq!(iter.err(), Some(DbError::ShuttingDown));
    }
}
