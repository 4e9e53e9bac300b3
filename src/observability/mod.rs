//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Lock-free counters
//! - Typed lifecycle events
//!
//! Observability is read-only: it never changes how an operation behaves
//! and never fails one.
//!
//! # Usage
//!
//! ```ignore
//! use recdb::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::QueryTimeout, &[("prefix", "path/to/")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_puts();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event at its default severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // only verifies no panic
        log_event(Event::DatabaseStart);
        log_event(Event::DatabaseStop);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("path", "/tmp/recdb.json")]);
    }
}
