//! # Storage Backends
//!
//! Implementations of the [`Database`](crate::database::Database)
//! contract.

mod hashmap;

pub use hashmap::HashMapDb;
