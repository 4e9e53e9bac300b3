//! Query compile errors
//!
//! Always returned synchronously from parsing, construction or
//! `Query::check`; never deferred into a result stream.

use thiserror::Error;

/// Result type for query compilation
pub type QueryResult<T> = Result<T, QueryError>;

/// Query compile errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    // ==================
    // Syntax Errors
    // ==================
    /// Input ended while more tokens were expected
    #[error("unexpected end at position {0}")]
    UnexpectedEnd(usize),

    /// Query text did not start with the `query` keyword
    #[error("queries must start with \"query\"")]
    MissingQueryKeyword,

    /// A clause appeared twice
    #[error("duplicate \"{clause}\" clause found at position {position}")]
    DuplicateClause { clause: String, position: usize },

    /// Unknown clause keyword
    #[error("unknown clause \"{clause}\" at position {position}")]
    UnknownClause { clause: String, position: usize },

    /// Unknown condition operator
    #[error("unknown operator at position {0}")]
    UnknownOperator(usize),

    /// Limit/offset value is not an unsigned 31-bit integer
    #[error("could not parse integer ({text}) at position {position}")]
    InvalidInteger { text: String, position: usize },

    /// A quote appeared inside a word
    #[error("quotes ('\"') may not be used within words, please escape with '\\' (position: {0})")]
    QuoteWithinWord(usize),

    /// `and` and `or` were mixed in one group
    #[error("you may not mix \"and\" and \"or\" (position: {0})")]
    MixedAndOr(usize),

    // ==================
    // Operand Errors
    // ==================
    /// Operand could not be normalized to the operator family's type
    #[error("{0}")]
    InvalidOperand(String),

    /// Regex operand does not compile
    #[error("could not compile regex \"{pattern}\": {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

impl QueryError {
    /// Create an operand normalization error
    pub fn invalid_operand(msg: impl Into<String>) -> Self {
        Self::InvalidOperand(msg.into())
    }

    /// Whether this is a syntax error of the text form
    pub fn is_syntax(&self) -> bool {
        !matches!(self, Self::InvalidOperand(_) | Self::InvalidRegex { .. })
    }
}
