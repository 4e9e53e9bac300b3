//! # Query Runner
//!
//! Turns a backend's stream of candidate records into a filtered,
//! bounded [`RecordIterator`]. The backend calls `submit` once per
//! candidate in its natural enumeration order and `finish` when the
//! enumeration ends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::context::Context;
use super::errors::{DbError, DbResult};
use super::iterator::{Finisher, RecordIterator};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::query::Query;
use crate::record::RecordRef;

/// Feeds matching records of one query into an iterator
#[derive(Debug)]
pub struct QueryRunner {
    query: Arc<Query>,
    finisher: Finisher,
    timeout: Duration,
    matched: usize,
    emitted: usize,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl QueryRunner {
    /// Check the query and create the runner with its consumer iterator
    pub fn new(
        query: Query,
        queue_size: usize,
        timeout: Duration,
    ) -> DbResult<(QueryRunner, RecordIterator)> {
        let query = query.checked()?;
        let (iter, finisher) = RecordIterator::new(queue_size);

        let runner = QueryRunner {
            query: Arc::new(query),
            finisher,
            timeout,
            matched: 0,
            emitted: 0,
            metrics: None,
        };
        Ok((runner, iter))
    }

    /// Count starts, emitted records and timeouts in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        metrics.increment_queries_started();
        self.metrics = Some(metrics);
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Handle that can end the stream from outside the runner
    pub fn finisher(&self) -> Finisher {
        self.finisher.clone()
    }

    /// Number of records delivered so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Offer one candidate record. Returns true once the query is done
    /// and the backend should stop enumerating.
    pub async fn submit(&mut self, ctx: &Context, record: RecordRef) -> bool {
        if self.finisher.poll_done(ctx) {
            self.log_termination();
            return true;
        }

        if !self.query.matches_key(record.key())
            || !self.query.matches_permission(record.permission())
            || !record.is_valid_at(Utc::now())
        {
            return false;
        }
        if self.query.condition().is_some() && undecodable(&record) {
            let warning = format!("record {}: payload could not be decoded", record.key());
            log_event_with_fields(Event::RecordDecodeFailed, &[("key", record.key())]);
            self.finisher.warn(warning);
            return false;
        }
        if !self.query.matches_record(record.as_ref()) {
            return false;
        }

        self.matched += 1;
        if self.matched <= self.query.offset() {
            return false;
        }

        if !self.finisher.offer(ctx, record, self.timeout).await {
            self.log_termination();
            return true;
        }

        self.emitted += 1;
        if let Some(metrics) = &self.metrics {
            metrics.increment_records_emitted();
        }

        let limit = self.query.limit();
        if limit > 0 && self.emitted >= limit {
            self.finisher.finish(None);
            return true;
        }
        false
    }

    /// End the stream; no-op if it already ended
    pub fn finish(&self, err: Option<DbError>) {
        if self.finisher.finish(err) {
            let emitted = self.emitted.to_string();
            log_event_with_fields(
                Event::QueryComplete,
                &[("emitted", emitted.as_str()), ("prefix", self.query.key_prefix())],
            );
        }
    }

    fn log_termination(&self) {
        let event = match self.finisher.err() {
            Some(DbError::Timeout) => {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_query_timeouts();
                }
                Event::QueryTimeout
            }
            Some(DbError::Canceled) => Event::QueryCanceled,
            _ => return,
        };
        let query = self.query.print();
        log_event_with_fields(event, &[("query", query.as_str())]);
    }
}

/// Structured payload that is present but cannot be read
fn undecodable(record: &RecordRef) -> bool {
    record.format().is_structured()
        && record.object().is_none()
        && record.data().is_some_and(|d| !d.is_empty())
        && record.accessor().is_none()
}
