//! Record permission levels
//!
//! A record carries the level a requester must hold to read or write it.
//! Higher values are more restricted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered trust level required to access a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(i8);

impl Permission {
    /// The operation is not supported for anyone
    pub const NOT_SUPPORTED: Permission = Permission(0);
    /// Anyone, without authentication
    pub const ANYONE: Permission = Permission(1);
    /// Authenticated third party acting as a simple user
    pub const USER: Permission = Permission(2);
    /// Authenticated third party acting as an administrator
    pub const ADMIN: Permission = Permission(3);
    /// First-party components only
    pub const SELF_: Permission = Permission(4);

    /// Create a permission from its raw level
    pub const fn new(level: i8) -> Self {
        Self(level)
    }

    /// Returns the raw level
    pub const fn level(&self) -> i8 {
        self.0
    }

    /// Whether a requester holding `self` may access something that requires `required`
    pub fn satisfies(&self, required: Permission) -> bool {
        self.0 >= required.0
    }

    /// Returns the canonical name, if this is a named level
    pub fn name(&self) -> Option<&'static str> {
        match self.0 {
            0 => Some("none"),
            1 => Some("anyone"),
            2 => Some("user"),
            3 => Some("admin"),
            4 => Some("self"),
            _ => None,
        }
    }
}

impl Default for Permission {
    fn default() -> Self {
        Permission::ANYONE
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Permission::NOT_SUPPORTED),
            "anyone" => Ok(Permission::ANYONE),
            "user" => Ok(Permission::USER),
            "admin" => Ok(Permission::ADMIN),
            "self" => Ok(Permission::SELF_),
            other => other
                .parse::<i8>()
                .map(Permission)
                .map_err(|_| format!("unknown permission level: {}", s)),
        }
    }
}
