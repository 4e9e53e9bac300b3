//! Observable lifecycle events
//!
//! Events are explicit and typed. Each one has a fixed log name and a
//! default severity.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Backend started
    DatabaseStart,
    /// Backend stopped, subscriptions released, storage cleared
    DatabaseStop,
    /// Configuration loaded
    ConfigLoaded,

    // Queries
    /// Query runner started
    QueryStart,
    /// Query runner finished
    QueryComplete,
    /// Consumer did not accept a record in time
    QueryTimeout,
    /// Query stopped by its caller
    QueryCanceled,
    /// A record payload could not be read during a query
    RecordDecodeFailed,
    /// Expired records removed by maintenance
    RecordsPurged,

    // Subscriptions
    /// Subscription registered
    SubscriptionCreated,
    /// Subscriber did not accept a record in time
    SubscriptionTimeout,
    /// Finished subscriptions swept from the registry
    SubscriptionsSwept,
}

impl Event {
    /// Returns the log name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DatabaseStart => "DATABASE_START",
            Event::DatabaseStop => "DATABASE_STOP",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::QueryStart => "QUERY_START",
            Event::QueryComplete => "QUERY_COMPLETE",
            Event::QueryTimeout => "QUERY_TIMEOUT",
            Event::QueryCanceled => "QUERY_CANCELED",
            Event::RecordDecodeFailed => "RECORD_DECODE_FAILED",
            Event::RecordsPurged => "RECORDS_PURGED",
            Event::SubscriptionCreated => "SUBSCRIPTION_CREATED",
            Event::SubscriptionTimeout => "SUBSCRIPTION_TIMEOUT",
            Event::SubscriptionsSwept => "SUBSCRIPTIONS_SWEPT",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryStart | Event::QueryComplete | Event::SubscriptionsSwept => Severity::Trace,
            Event::QueryTimeout | Event::SubscriptionTimeout | Event::RecordDecodeFailed => {
                Severity::Warn
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
