//! recdb - an embedded record store with a query language and live
//! subscriptions
//!
//! - [`record`]: records, payload formats, permissions, field accessors
//! - [`query`]: condition trees, queries and their text form
//! - [`database`]: iterators, query runners, subscription fan-out and
//!   the backend contract
//! - [`storage`]: the in-memory hashmap backend

pub mod cli;
pub mod config;
pub mod database;
pub mod observability;
pub mod query;
pub mod record;
pub mod storage;
