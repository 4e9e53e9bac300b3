//! Engine configuration
//!
//! Loaded from a JSON file. Every field is optional:
//!
//! ```json
//! {
//!   "query_timeout_ms": 100,
//!   "subscription_timeout_ms": 10,
//!   "default_queue_size": 100,
//!   "read_only": false,
//!   "log_level": "info"
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Severity};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON for the config schema
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// How long a query waits for a slow consumer (default: 100)
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// How long a write waits for a slow subscriber (default: 10)
    #[serde(default = "default_subscription_timeout_ms")]
    pub subscription_timeout_ms: u64,

    /// Queue size used when a caller does not pick one (default: 100)
    #[serde(default = "default_queue_size")]
    pub default_queue_size: usize,

    /// Reject all writes (default: false)
    #[serde(default)]
    pub read_only: bool,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_query_timeout_ms() -> u64 {
    100
}

fn default_subscription_timeout_ms() -> u64 {
    10
}

fn default_queue_size() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            subscription_timeout_ms: default_subscription_timeout_ms(),
            default_queue_size: default_queue_size(),
            read_only: false,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;

        let path_text = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", path_text.as_str())]);
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("query_timeout_ms must be > 0".into()));
        }
        if self.subscription_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "subscription_timeout_ms must be > 0".into(),
            ));
        }
        if self.default_queue_size == 0 {
            return Err(ConfigError::Invalid("default_queue_size must be > 0".into()));
        }
        self.log_severity()?;
        Ok(())
    }

    /// Copy of this config with writes disabled
    pub fn with_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn subscription_timeout(&self) -> Duration {
        Duration::from_millis(self.subscription_timeout_ms)
    }

    pub fn log_severity(&self) -> Result<Severity, ConfigError> {
        self.log_level.parse().map_err(ConfigError::Invalid)
    }
}
