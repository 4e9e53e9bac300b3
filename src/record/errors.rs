//! Record codec errors

use thiserror::Error;

use super::format::Format;

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised while encoding or decoding record payloads
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// The format byte is not known
    #[error("unknown format: {0:#04x}")]
    UnknownFormat(u8),

    /// The format cannot be decoded into a structured value
    #[error("format {0} is opaque and cannot be loaded")]
    Opaque(Format),

    /// The record has neither data nor an object
    #[error("record {0} has no payload")]
    MissingPayload(String),

    /// Encoding failed
    #[error("failed to dump {format}: {reason}")]
    Dump { format: Format, reason: String },

    /// Decoding failed
    #[error("failed to load {format}: {reason}")]
    Load { format: Format, reason: String },

    /// A selector could not be written
    #[error("cannot set {selector}: {reason}")]
    Set { selector: String, reason: String },
}
