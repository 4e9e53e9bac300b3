//! # Records
//!
//! The unit of storage. A record is addressed by a flat string key and
//! carries metadata (timestamps, required permission, payload format)
//! plus its payload as encoded bytes, a decoded object, or both.
//!
//! The query engine never deserializes a record into a typed struct. It
//! evaluates conditions through an [`Accessor`], which is only available
//! for structured formats.

mod accessor;
mod errors;
mod expiry;
mod format;
mod mem;
mod permission;

pub use accessor::{Accessor, JsonAccessor};
pub use errors::{RecordError, RecordResult};
pub use expiry::Expiry;
pub use format::Format;
pub use mem::{DeletedRecord, MemRecord};
pub use permission::Permission;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Shared handle to a record
pub type RecordRef = Arc<dyn Record>;

/// The record contract
///
/// A backend may keep encoded bytes, a decoded object, or both, but every
/// method must answer consistently.
pub trait Record: Send + Sync + fmt::Debug {
    /// Flat, namespace-prefixed key, e.g. `path/to/A`
    fn key(&self) -> &str;

    /// Creation time; `None` for tombstones
    fn created(&self) -> Option<DateTime<Utc>>;

    /// Last update time; `None` for tombstones
    fn updated(&self) -> Option<DateTime<Utc>>;

    /// Level required to access this record
    fn permission(&self) -> Permission;

    /// Format of [`Record::data`]
    fn format(&self) -> Format;

    /// Encoded payload
    fn data(&self) -> Option<&[u8]>;

    /// Decoded payload
    fn object(&self) -> Option<&Value>;

    /// Whether this is a deletion tombstone
    fn is_deleted(&self) -> bool {
        false
    }

    /// Expiry policy
    fn expiry(&self) -> Expiry {
        Expiry::Never
    }

    /// Instant after which the record is no longer valid
    fn expires(&self) -> Option<DateTime<Utc>> {
        self.expiry().deadline(self.updated())
    }

    /// Whether the record is still valid at `now`
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires().map_or(true, |deadline| deadline >= now)
    }

    /// Returns a field accessor, or `None` when the payload cannot be
    /// addressed by field (opaque format, empty or undecodable data).
    fn accessor(&self) -> Option<Box<dyn Accessor + '_>> {
        if !self.format().is_structured() {
            return None;
        }
        if let Some(object) = self.object() {
            return Some(Box::new(JsonAccessor::new(object)));
        }
        let data = self.data().filter(|d| !d.is_empty())?;
        JsonAccessor::from_bytes(data).map(|acc| Box::new(acc) as Box<dyn Accessor>)
    }
}

/// Decode a record's payload into a typed value
pub fn decode<T: DeserializeOwned>(record: &dyn Record) -> RecordResult<T> {
    let value = match record.object() {
        Some(object) => object.clone(),
        None => {
            let data = record
                .data()
                .ok_or_else(|| RecordError::MissingPayload(record.key().to_string()))?;
            record.format().load(data)?
        }
    };

    serde_json::from_value(value).map_err(|e| RecordError::Load {
        format: record.format(),
        reason: e.to_string(),
    })
}
