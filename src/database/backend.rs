//! # Database Contract
//!
//! What a storage backend implements. Backends build on [`QueryRunner`]
//! for queries and [`SubscriptionPlugin`] for live updates.
//!
//! [`QueryRunner`]: super::QueryRunner
//! [`SubscriptionPlugin`]: super::SubscriptionPlugin

use async_trait::async_trait;

use super::context::Context;
use super::errors::{DbError, DbResult};
use super::iterator::RecordIterator;
use super::subscription::Subscription;
use crate::query::Query;
use crate::record::RecordRef;

/// A storage backend
///
/// A backend starts stopped. Once stopped, every operation fails with
/// `DbError::Stopped`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Backend instance name
    fn name(&self) -> &str;

    /// Whether writes are rejected with `DbError::ReadOnly`
    fn read_only(&self) -> bool {
        false
    }

    /// Start serving requests
    async fn start(&self) -> DbResult<()>;

    /// Stop serving: finish all subscriptions, end running queries and
    /// clear storage
    async fn stop(&self) -> DbResult<()>;

    /// Whether a record exists under `key`
    async fn exists(&self, key: &str) -> DbResult<bool>;

    /// Fetch a record; `DbError::NotFound` when absent
    async fn get(&self, key: &str) -> DbResult<RecordRef>;

    /// Insert or replace a record and notify subscribers
    async fn put(&self, record: RecordRef) -> DbResult<()>;

    /// Remove a record and notify subscribers with a tombstone
    async fn delete(&self, key: &str) -> DbResult<()>;

    /// Open a batch writer
    async fn batch_put<'a>(&'a self) -> DbResult<Box<dyn BatchWriter + 'a>> {
        Err(DbError::NotImplemented)
    }

    /// Delete every record matching `query`, returning the count
    async fn batch_delete(&self, _query: Query) -> DbResult<usize> {
        Err(DbError::NotImplemented)
    }

    /// Remove records that are no longer valid, returning the count.
    /// Stops early, without error, when `ctx` is cancelled.
    async fn maintain(&self, _ctx: &Context) -> DbResult<usize> {
        Err(DbError::NotImplemented)
    }

    /// Run a query, cancelling it when `ctx` is cancelled
    async fn query_with_context(
        &self,
        ctx: &Context,
        query: Query,
        queue_size: usize,
    ) -> DbResult<RecordIterator>;

    /// Run a query
    async fn query(&self, query: Query, queue_size: usize) -> DbResult<RecordIterator> {
        self.query_with_context(&Context::background(), query, queue_size)
            .await
    }

    /// Register a live query
    async fn subscribe(&self, query: Query, queue_size: usize) -> DbResult<Subscription>;
}

/// A batch of puts
///
/// Records become visible as they are put. `finish` must be called to
/// close the batch.
#[async_trait]
pub trait BatchWriter: Send {
    async fn put(&mut self, record: RecordRef) -> DbResult<()>;

    /// Close the batch, returning how many records were written
    async fn finish(self: Box<Self>) -> DbResult<usize>;
}
