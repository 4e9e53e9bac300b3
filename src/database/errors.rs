//! # Database Errors
//!
//! Sentinel errors shared by every backend. Callers match on the variant;
//! transports map `code()` onto their own protocol.
//!
//! - RECDB_NOT_FOUND
//! - RECDB_PERMISSION_DENIED
//! - RECDB_READ_ONLY
//! - RECDB_INVALID_RECORD
//! - RECDB_SHUTTING_DOWN
//! - RECDB_STOPPED
//! - RECDB_TIMEOUT
//! - RECDB_CANCELED
//! - RECDB_NOT_IMPLEMENTED
//! - RECDB_INVALID_QUERY
//! - RECDB_RECORD

use thiserror::Error;

use crate::query::QueryError;
use crate::record::RecordError;

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Database errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbError {
    // ==================
    // Backend Errors
    // ==================
    /// No record under the key
    #[error("database entry not found")]
    NotFound,

    /// Requester is not permitted to access the record
    #[error("permission denied")]
    PermissionDenied,

    /// Backend does not accept writes
    #[error("database is read only")]
    ReadOnly,

    /// Record cannot be stored
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Backend does not support the operation
    #[error("not implemented by this storage")]
    NotImplemented,

    /// Backend has been stopped
    #[error("database stopped")]
    Stopped,

    // ==================
    // Stream Errors
    // ==================
    /// Backend is shutting down
    #[error("database is shutting down")]
    ShuttingDown,

    /// Consumer did not accept a record in time
    #[error("timed out")]
    Timeout,

    /// Caller context was cancelled
    #[error("canceled")]
    Canceled,

    // ==================
    // Wrapped Errors
    // ==================
    /// Query failed to compile
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// Record payload could not be encoded or decoded
    #[error("record error: {0}")]
    Record(#[from] RecordError),
}

impl DbError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DbError::NotFound => "RECDB_NOT_FOUND",
            DbError::PermissionDenied => "RECDB_PERMISSION_DENIED",
            DbError::ReadOnly => "RECDB_READ_ONLY",
            DbError::InvalidRecord(_) => "RECDB_INVALID_RECORD",
            DbError::NotImplemented => "RECDB_NOT_IMPLEMENTED",
            DbError::Stopped => "RECDB_STOPPED",
            DbError::ShuttingDown => "RECDB_SHUTTING_DOWN",
            DbError::Timeout => "RECDB_TIMEOUT",
            DbError::Canceled => "RECDB_CANCELED",
            DbError::InvalidQuery(_) => "RECDB_INVALID_QUERY",
            DbError::Record(_) => "RECDB_RECORD",
        }
    }

    /// Whether the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Timeout | DbError::ShuttingDown)
    }

    /// Whether the error ends a stream rather than a single call
    pub fn is_stream_fatal(&self) -> bool {
        matches!(
            self,
            DbError::Timeout | DbError::Canceled | DbError::ShuttingDown | DbError::Stopped
        )
    }

    /// Create an invalid record error
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord(reason.into())
    }
}
