//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one backend
///
/// All counters use Relaxed ordering; readers only need eventual values.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    puts: AtomicU64,
    deletes: AtomicU64,
    queries_started: AtomicU64,
    records_emitted: AtomicU64,
    query_timeouts: AtomicU64,
    subscriptions_created: AtomicU64,
    deliveries: AtomicU64,
    subscription_timeouts: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Writes

    pub fn increment_puts(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    // Queries

    pub fn increment_queries_started(&self) {
        self.queries_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_query_timeouts(&self) {
        self.query_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // Subscriptions

    pub fn increment_subscriptions_created(&self) {
        self.subscriptions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deliveries(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_subscription_timeouts(&self) {
        self.subscription_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            puts: self.puts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            queries_started: self.queries_started.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            query_timeouts: self.query_timeouts.load(Ordering::Relaxed),
            subscriptions_created: self.subscriptions_created.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            subscription_timeouts: self.subscription_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub puts: u64,
    pub deletes: u64,
    pub queries_started: u64,
    pub records_emitted: u64,
    pub query_timeouts: u64,
    pub subscriptions_created: u64,
    pub deliveries: u64,
    pub subscription_timeouts: u64,
}

impl MetricsSnapshot {
    /// Serialize as one JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
