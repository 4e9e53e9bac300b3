//! Payload format tags
//!
//! The byte-level codec is opaque to the engine: a format is a tag plus a
//! dump/load capability over `serde_json::Value`.

use std::fmt;

use serde_json::Value;

use super::errors::{RecordError, RecordResult};

/// Serialization format of a record's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Format {
    /// Unspecified; never valid for a stored record
    Auto = 0,
    /// Plain UTF-8 string
    String = b'S',
    /// Opaque bytes
    Bytes = b'X',
    /// JSON document
    Json = b'J',
}

impl Format {
    /// Returns the format for a tag byte
    pub fn from_byte(b: u8) -> RecordResult<Self> {
        match b {
            0 => Ok(Format::Auto),
            b'S' => Ok(Format::String),
            b'X' => Ok(Format::Bytes),
            b'J' => Ok(Format::Json),
            other => Err(RecordError::UnknownFormat(other)),
        }
    }

    /// Returns the tag byte
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Whether field accessors can be built for this format
    pub fn is_structured(&self) -> bool {
        matches!(self, Format::Json)
    }

    /// Encode a value in this format
    pub fn dump(&self, value: &Value) -> RecordResult<Vec<u8>> {
        match self {
            Format::Json => serde_json::to_vec(value).map_err(|e| RecordError::Dump {
                format: *self,
                reason: e.to_string(),
            }),
            Format::String => match value {
                Value::String(s) => Ok(s.as_bytes().to_vec()),
                other => Err(RecordError::Dump {
                    format: *self,
                    reason: format!("expected a string, got {}", other),
                }),
            },
            Format::Bytes | Format::Auto => Err(RecordError::Opaque(*self)),
        }
    }

    /// Decode data in this format
    pub fn load(&self, data: &[u8]) -> RecordResult<Value> {
        match self {
            Format::Json => serde_json::from_slice(data).map_err(|e| RecordError::Load {
                format: *self,
                reason: e.to_string(),
            }),
            Format::String => std::str::from_utf8(data)
                .map(|s| Value::String(s.to_string()))
                .map_err(|e| RecordError::Load {
                    format: *self,
                    reason: e.to_string(),
                }),
            Format::Bytes | Format::Auto => Err(RecordError::Opaque(*self)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Auto => "auto",
            Format::String => "string",
            Format::Bytes => "bytes",
            Format::Json => "json",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_bytes() {
        assert_eq!(Format::Json.as_byte(), b'J');
        assert_eq!(Format::from_byte(b'X').unwrap(), Format::Bytes);
        assert_eq!(Format::from_byte(b'?'), Err(RecordError::UnknownFormat(b'?')));
    }

    #[test]
    fn test_json_codec() {
        let value = json!({"S": "banana", "I": 42});
        let data = Format::Json.dump(&value).unwrap();
        assert_eq!(Format::Json.load(&data).unwrap(), value);
    }

    #[test]
    fn test_opaque_formats() {
        assert!(matches!(Format::Bytes.load(b"\x00\x01"), Err(RecordError::Opaque(_))));
        assert!(!Format::Bytes.is_structured());
        assert!(Format::Json.is_structured());
    }

    #[test]
    fn test_string_rejects_non_string() {
        assert!(Format::String.dump(&json!(1)).is_err());
        assert_eq!(Format::String.load(b"hi").unwrap(), json!("hi"));
    }
}
