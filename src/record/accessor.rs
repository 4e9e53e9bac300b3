//! Field accessors
//!
//! An accessor resolves a dotted selector against a record payload without
//! deserializing it into a typed struct. Selectors:
//!
//! - `field`, `field.sub` - object members
//! - `array.0` - array index
//! - `items.#` - length of an array or object
//! - `\.` - a literal dot inside a member name
//!
//! Unresolvable selectors yield `None`; they are never errors.

use std::borrow::Cow;

use serde_json::Value;

use super::errors::{RecordError, RecordResult};

/// Read-only, selector-addressable view over a record payload
pub trait Accessor {
    /// Returns the raw value at `key`
    fn get(&self, key: &str) -> Option<Value>;

    /// Returns the string at `key`
    fn get_string(&self, key: &str) -> Option<String>;

    /// Returns the string array at `key`
    fn get_string_array(&self, key: &str) -> Option<Vec<String>>;

    /// Returns the integer at `key`
    fn get_int(&self, key: &str) -> Option<i64>;

    /// Returns the float at `key`
    fn get_float(&self, key: &str) -> Option<f64>;

    /// Returns the bool at `key`
    fn get_bool(&self, key: &str) -> Option<bool>;

    /// Whether `key` resolves to any value
    fn exists(&self, key: &str) -> bool;

    /// Accessor kind, for diagnostics
    fn type_name(&self) -> &'static str;
}

/// A resolved selector
enum Resolved<'v> {
    Value(&'v Value),
    Length(usize),
}

/// Accessor over a JSON document
#[derive(Debug, Clone)]
pub struct JsonAccessor<'a> {
    root: Cow<'a, Value>,
}

impl<'a> JsonAccessor<'a> {
    /// Borrow an already decoded document
    pub fn new(root: &'a Value) -> Self {
        Self {
            root: Cow::Borrowed(root),
        }
    }

    /// Take ownership of a decoded document
    pub fn owned(root: Value) -> JsonAccessor<'static> {
        JsonAccessor {
            root: Cow::Owned(root),
        }
    }

    /// Decode a JSON document; `None` if the bytes are not valid JSON
    pub fn from_bytes(data: &[u8]) -> Option<JsonAccessor<'static>> {
        serde_json::from_slice(data).ok().map(JsonAccessor::owned)
    }

    /// Write `value` at `key`, creating missing object members on the
    /// way. Array elements must already exist.
    pub fn set(&mut self, key: &str, value: Value) -> RecordResult<()> {
        let fail = |reason: String| RecordError::Set {
            selector: key.to_string(),
            reason,
        };
        let parts = split_selector(key);
        let last = parts.len() - 1;
        let mut current: &mut Value = self.root.to_mut();

        for (i, part) in parts.iter().enumerate() {
            current = match current {
                Value::Object(members) => {
                    if i == last {
                        members.insert(part.clone(), value);
                        return Ok(());
                    }
                    members
                        .entry(part.clone())
                        .or_insert_with(|| Value::Object(Default::default()))
                }
                Value::Array(items) => {
                    let slot = part
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| items.get_mut(index))
                        .ok_or_else(|| fail(format!("no array element {}", part)))?;
                    if i == last {
                        *slot = value;
                        return Ok(());
                    }
                    slot
                }
                _ => return Err(fail(format!("parent of {} is not an object or array", part))),
            };
        }
        Ok(())
    }

    /// Take the document out of the accessor
    pub fn into_value(self) -> Value {
        self.root.into_owned()
    }

    fn resolve(&self, key: &str) -> Option<Resolved<'_>> {
        let parts = split_selector(key);
        let last = parts.len() - 1;
        let mut current: &Value = &self.root;

        for (i, part) in parts.iter().enumerate() {
            if part == "#" && i == last {
                return match current {
                    Value::Array(items) => Some(Resolved::Length(items.len())),
                    Value::Object(members) => Some(Resolved::Length(members.len())),
                    _ => None,
                };
            }
            current = match current {
                Value::Object(members) => members.get(part.as_str())?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(Resolved::Value(current))
    }
}

impl Accessor for JsonAccessor<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        match self.resolve(key)? {
            Resolved::Value(v) => Some(v.clone()),
            Resolved::Length(n) => Some(Value::from(n)),
        }
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.resolve(key)? {
            Resolved::Value(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        match self.resolve(key)? {
            Resolved::Value(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        match self.resolve(key)? {
            Resolved::Value(Value::Number(n)) => n.as_i64(),
            Resolved::Length(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        match self.resolve(key)? {
            Resolved::Value(Value::Number(n)) => n.as_f64(),
            Resolved::Length(n) => Some(n as f64),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.resolve(key)? {
            Resolved::Value(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    fn type_name(&self) -> &'static str {
        "JsonAccessor"
    }
}

/// Split a selector on unescaped dots
fn split_selector(key: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '.' => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}
