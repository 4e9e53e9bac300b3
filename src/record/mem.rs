//! In-memory record implementations

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::errors::{RecordError, RecordResult};
use super::{Expiry, Format, Permission, Record, RecordRef};

/// A live record held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct MemRecord {
    key: String,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    permission: Permission,
    format: Format,
    data: Option<Vec<u8>>,
    object: Option<Value>,
    expiry: Expiry,
}

impl MemRecord {
    /// Create a record without payload
    pub fn new(key: impl Into<String>, permission: Permission) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            created: now,
            updated: now,
            permission,
            format: Format::Auto,
            data: None,
            object: None,
            expiry: Expiry::Never,
        }
    }

    /// Create a JSON record from any serializable value
    pub fn from_serializable<T: Serialize>(
        key: impl Into<String>,
        permission: Permission,
        value: &T,
    ) -> RecordResult<Self> {
        let object = serde_json::to_value(value).map_err(|e| RecordError::Dump {
            format: Format::Json,
            reason: e.to_string(),
        })?;
        Ok(Self::new(key, permission).with_object(object))
    }

    /// Copy another record's contents, keeping its creation time and
    /// stamping the update time with now
    pub fn copy_of(record: &dyn Record) -> Self {
        let now = Utc::now();
        Self {
            key: record.key().to_string(),
            created: record.created().unwrap_or(now),
            updated: now,
            permission: record.permission(),
            format: record.format(),
            data: record.data().map(<[u8]>::to_vec),
            object: record.object().cloned(),
            expiry: record.expiry(),
        }
    }

    /// Copy another record's payload as a brand new record: both
    /// timestamps are stamped now and the expiry is cleared
    pub fn fresh_copy_of(record: &dyn Record) -> Self {
        let copy = Self::copy_of(record).with_expiry(Expiry::Never);
        let created = copy.updated;
        copy.with_created(created)
    }

    /// Set a decoded JSON payload, replacing any previous payload
    pub fn with_object(mut self, object: Value) -> Self {
        self.format = Format::Json;
        self.object = Some(object);
        self.data = None;
        self
    }

    /// Set an encoded payload, replacing any previous payload
    pub fn with_data(mut self, format: Format, data: Vec<u8>) -> Self {
        self.format = format;
        self.data = Some(data);
        self.object = None;
        self
    }

    /// Override the creation time
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Set the expiry policy
    pub fn with_expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    /// Wrap into a shared record handle
    pub fn into_ref(self) -> RecordRef {
        std::sync::Arc::new(self)
    }
}

impl Record for MemRecord {
    fn key(&self) -> &str {
        &self.key
    }

    fn created(&self) -> Option<DateTime<Utc>> {
        Some(self.created)
    }

    fn updated(&self) -> Option<DateTime<Utc>> {
        Some(self.updated)
    }

    fn permission(&self) -> Permission {
        self.permission
    }

    fn format(&self) -> Format {
        self.format
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn object(&self) -> Option<&Value> {
        self.object.as_ref()
    }

    fn expiry(&self) -> Expiry {
        self.expiry
    }
}

/// Deletion marker delivered to subscribers; never stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedRecord {
    key: String,
    permission: Permission,
}

impl DeletedRecord {
    /// Tombstone for the given record
    pub fn of(record: &dyn Record) -> Self {
        Self {
            key: record.key().to_string(),
            permission: record.permission(),
        }
    }

    /// Wrap into a shared record handle
    pub fn into_ref(self) -> RecordRef {
        std::sync::Arc::new(self)
    }
}

impl Record for DeletedRecord {
    fn key(&self) -> &str {
        &self.key
    }

    fn created(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn updated(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn permission(&self) -> Permission {
        self.permission
    }

    fn format(&self) -> Format {
        Format::Auto
    }

    fn data(&self) -> Option<&[u8]> {
        None
    }

    fn object(&self) -> Option<&Value> {
        None
    }

    fn is_deleted(&self) -> bool {
        true
    }
}
