//! # Database Core
//!
//! The pieces every storage backend is built from:
//!
//! - [`RecordIterator`]: bounded, cancellable record stream
//! - [`QueryRunner`]: filters candidates into an iterator
//! - [`SubscriptionPlugin`]: fans writes out to live queries
//! - [`Database`]: the backend contract
//! - [`Interface`]: permission-scoped access to a backend
//!
//! Every blocking send is bounded by a timeout. A consumer that does not
//! keep up is finished with `DbError::Timeout` instead of stalling the
//! producer.

mod backend;
mod context;
mod errors;
mod interface;
mod iterator;
mod runner;
mod subscription;

use std::time::Duration;

pub use backend::{BatchWriter, Database};
pub use context::Context;
pub use errors::{DbError, DbResult};
pub use interface::Interface;
pub use iterator::{Finisher, RecordIterator};
pub use runner::QueryRunner;
pub use subscription::{Subscription, SubscriptionPlugin};

/// How long a query waits for a slow consumer
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(100);

/// How long a write waits for a slow subscriber
pub const DEFAULT_SUBSCRIPTION_TIMEOUT: Duration = Duration::from_millis(10);
