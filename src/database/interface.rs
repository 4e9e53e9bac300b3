//! Permission-scoped database access
//!
//! An [`Interface`] wraps a backend together with the permission level its
//! holder was granted. Reads and writes of records above that level fail
//! with `DbError::PermissionDenied`; queries and subscriptions run with
//! the granted level.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::backend::Database;
use super::errors::{DbError, DbResult};
use super::iterator::RecordIterator;
use super::subscription::Subscription;
use crate::query::Query;
use crate::record::{Accessor, Expiry, JsonAccessor, MemRecord, Permission, Record, RecordRef};

/// A backend handle bound to a permission level
#[derive(Clone)]
pub struct Interface {
    db: Arc<dyn Database>,
    permission: Permission,
}

impl Interface {
    pub fn new(db: Arc<dyn Database>, permission: Permission) -> Self {
        Self { db, permission }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    fn check(&self, required: Permission) -> DbResult<()> {
        if self.permission.satisfies(required) {
            Ok(())
        } else {
            Err(DbError::PermissionDenied)
        }
    }

    /// Whether the key exists. Records above the granted level still
    /// count as existing.
    pub async fn exists(&self, key: &str) -> DbResult<bool> {
        match self.get(key).await {
            Ok(_) | Err(DbError::PermissionDenied) => Ok(true),
            Err(DbError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, key: &str) -> DbResult<RecordRef> {
        let record = self.db.get(key).await?;
        self.check(record.permission())?;
        Ok(record)
    }

    /// Write a record. Both the new record and any record it replaces
    /// must be within the granted level.
    pub async fn put(&self, record: RecordRef) -> DbResult<()> {
        if self.db.read_only() {
            return Err(DbError::ReadOnly);
        }
        self.check(record.permission())?;
        match self.db.get(record.key()).await {
            Ok(existing) => self.check(existing.permission())?,
            Err(DbError::NotFound) => {}
            Err(e) => return Err(e),
        }
        self.db.put(record).await
    }

    /// Write a record as new: its timestamps are reset and any expiry
    /// is dropped
    pub async fn put_new(&self, record: RecordRef) -> DbResult<()> {
        let fresh = MemRecord::fresh_copy_of(record.as_ref());
        self.put(fresh.into_ref()).await
    }

    /// Set one field of a stored record's structured payload
    pub async fn insert_value(&self, key: &str, selector: &str, value: Value) -> DbResult<()> {
        self.update(key, |record| {
            let document = match record.object() {
                Some(object) => object.clone(),
                None => {
                    let data = record.data().unwrap_or_default();
                    record.format().load(data)?
                }
            };
            let mut acc = JsonAccessor::owned(document);
            acc.set(selector, value).map_err(|e| {
                DbError::invalid_record(format!("failed to set value with {}: {}", acc.type_name(), e))
            })?;
            Ok(MemRecord::copy_of(record).with_object(acc.into_value()))
        })
        .await
    }

    /// Expire a stored record at a fixed instant
    pub async fn set_absolute_expiry(&self, key: &str, at: DateTime<Utc>) -> DbResult<()> {
        self.update(key, |record| {
            Ok(MemRecord::copy_of(record).with_expiry(Expiry::At(at)))
        })
        .await
    }

    /// Expire a stored record `ttl` after each of its updates
    pub async fn set_relative_expiry(&self, key: &str, ttl: Duration) -> DbResult<()> {
        self.update(key, |record| {
            Ok(MemRecord::copy_of(record).with_expiry(Expiry::AfterUpdate(ttl)))
        })
        .await
    }

    /// Read a record within the granted level, rewrite it and store the result
    async fn update<F>(&self, key: &str, rewrite: F) -> DbResult<()>
    where
        F: FnOnce(&dyn Record) -> DbResult<MemRecord> + Send,
    {
        if self.db.read_only() {
            return Err(DbError::ReadOnly);
        }
        let record = self.get(key).await?;
        let updated = rewrite(record.as_ref())?;
        self.db.put(updated.into_ref()).await
    }

    pub async fn delete(&self, key: &str) -> DbResult<()> {
        if self.db.read_only() {
            return Err(DbError::ReadOnly);
        }
        self.get(key).await?;
        self.db.delete(key).await
    }

    /// Run a query with the granted level
    pub async fn query(&self, query: Query, queue_size: usize) -> DbResult<RecordIterator> {
        self.db
            .query(query.with_access_permission(self.permission), queue_size)
            .await
    }

    /// Delete all records the granted level can see that match `query`
    pub async fn purge(&self, query: Query) -> DbResult<usize> {
        if self.db.read_only() {
            return Err(DbError::ReadOnly);
        }
        self.db
            .batch_delete(query.with_access_permission(self.permission))
            .await
    }

    /// Subscribe with the granted level
    pub async fn subscribe(&self, query: Query, queue_size: usize) -> DbResult<Subscription> {
        self.db
            .subscribe(query.with_access_permission(self.permission), queue_size)
            .await
    }
}

impl std::fmt::Debug for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interface")
            .field("db", &self.db.name())
            .field("permission", &self.permission)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Format;
    use crate::storage::HashMapDb;
    use serde_json::json;

    async fn setup(permission: Permission) -> (Arc<HashMapDb>, Interface) {
        let db = Arc::new(HashMapDb::started("interface").await.unwrap());
        let record = MemRecord::new("cfg/a", Permission::USER)
            .with_object(json!({"name": "a", "limits": {"max": 1}}))
            .with_created(Utc::now() - Duration::days(1));
        db.put(record.into_ref()).await.unwrap();
        let db_dyn: Arc<dyn Database> = db.clone();
        (db, Interface::new(db_dyn, permission))
    }

    #[tokio::test]
    async fn test_insert_value() {
        let (_db, iface) = setup(Permission::USER).await;
        iface.insert_value("cfg/a", "limits.max", json!(5)).await.unwrap();
        iface.insert_value("cfg/a", "limits.min", json!(0)).await.unwrap();

        let record = iface.get("cfg/a").await.unwrap();
        let acc = record.accessor().unwrap();
        assert_eq!(acc.get_int("limits.max"), Some(5));
        assert_eq!(acc.get_int("limits.min"), Some(0));
        assert_eq!(acc.get_string("name").as_deref(), Some("a"));
        assert_eq!(record.permission(), Permission::USER);
    }

    #[tokio::test]
    async fn test_insert_value_checks_permission_and_payload() {
        let (db, anon) = setup(Permission::ANYONE).await;
        assert_eq!(
            anon.insert_value("cfg/a", "name", json!("b")).await.unwrap_err(),
            DbError::PermissionDenied
        );
        assert_eq!(
            anon.insert_value("cfg/missing", "name", json!("b")).await.unwrap_err(),
            DbError::NotFound
        );

        let blob = MemRecord::new("cfg/blob", Permission::ANYONE).with_data(Format::Bytes, vec![1]);
        db.put(blob.into_ref()).await.unwrap();
        assert!(matches!(
            anon.insert_value("cfg/blob", "x", json!(1)).await.unwrap_err(),
            DbError::Record(_)
        ));

        let list = MemRecord::new("cfg/list", Permission::ANYONE).with_object(json!([1, 2]));
        db.put(list.into_ref()).await.unwrap();
        assert!(matches!(
            anon.insert_value("cfg/list", "7", json!(1)).await.unwrap_err(),
            DbError::InvalidRecord(_)
        ));
    }

    #[tokio::test]
    async fn test_put_new_resets_metadata() {
        let (_db, iface) = setup(Permission::USER).await;
        let old = iface.get("cfg/a").await.unwrap();
        let with_expiry = MemRecord::copy_of(old.as_ref())
            .with_expiry(Expiry::AfterUpdate(Duration::minutes(1)));

        iface.put_new(with_expiry.into_ref()).await.unwrap();
        let fresh = iface.get("cfg/a").await.unwrap();
        assert!(fresh.created().unwrap() > old.created().unwrap());
        assert_eq!(fresh.expiry(), Expiry::Never);

        let secret = MemRecord::new("cfg/secret", Permission::SELF_).with_object(json!({}));
        assert_eq!(
            iface.put_new(secret.into_ref()).await.unwrap_err(),
            DbError::PermissionDenied
        );
    }

    #[tokio::test]
    async fn test_set_expiry() {
        let (db, iface) = setup(Permission::USER).await;

        iface
            .set_relative_expiry("cfg/a", Duration::minutes(10))
            .await
            .unwrap();
        let record = iface.get("cfg/a").await.unwrap();
        assert_eq!(record.expiry(), Expiry::AfterUpdate(Duration::minutes(10)));
        assert!(record.expires().unwrap() > Utc::now());

        iface
            .set_absolute_expiry("cfg/a", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(iface.get("cfg/a").await.unwrap_err(), DbError::NotFound);
        assert!(!iface.exists("cfg/a").await.unwrap());

        assert_eq!(db.maintain(&crate::database::Context::new()).await.unwrap(), 1);
        assert!(db.is_empty());
    }
}
