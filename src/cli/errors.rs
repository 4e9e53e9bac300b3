//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::database::DbError;
use crate::query::QueryError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Input file has the wrong shape
    InputError,
    /// Query text did not compile
    QueryError,
    /// The store rejected an operation or a query failed
    DatabaseError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "RECDB_CLI_CONFIG_ERROR",
            Self::IoError => "RECDB_CLI_IO_ERROR",
            Self::InputError => "RECDB_CLI_INPUT_ERROR",
            Self::QueryError => "RECDB_CLI_QUERY_ERROR",
            Self::DatabaseError => "RECDB_CLI_DATABASE_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::input_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        let kind = if e.is_syntax() { "syntax error" } else { "invalid value" };
        Self::new(CliErrorCode::QueryError, format!("{}: {}", kind, e))
    }
}

impl From<DbError> for CliError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::InvalidQuery(q) => q.into(),
            other => {
                let mut message = format!("{} ({})", other, other.code());
                if other.is_stream_fatal() {
                    message = format!("query stream ended: {}", message);
                }
                if other.is_retryable() {
                    message.push_str("; retrying may succeed");
                }
                Self::new(CliErrorCode::DatabaseError, message)
            }
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
