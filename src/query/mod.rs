//! # Query Engine
//!
//! Query compilation and record matching:
//!
//! - `Condition`: boolean trees of field comparisons
//! - `Operator` / `Operand`: the comparison vocabulary
//! - `Query`: key prefix, condition and permission threshold
//! - `parse_query`: the text form
//!
//! Compile errors are always reported synchronously from construction,
//! parsing or `Query::check`.

mod condition;
mod errors;
mod operator;
mod parser;
#[allow(clippy::module_inception)]
mod query;

pub use condition::{Condition, FieldCondition};
pub use errors::{QueryError, QueryResult};
pub use operator::{Operand, Operator, OperatorFamily};
pub use parser::parse_query;
pub use query::Query;
