//! CLI module
//!
//! Provides command-line interface for:
//! - parse: Compile a query and print its canonical form
//! - query: Run a query over records loaded from a file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{parse, query, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
