//! CLI argument definitions using clap
//!
//! Commands:
//! - recdb parse <query>
//! - recdb query --records <path> [--config <path>] [--permission <level>] <query>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// recdb - an embedded record store with live queries
#[derive(Parser, Debug)]
#[command(name = "recdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a query and print its canonical form
    Parse {
        /// Query text, e.g. 'query path/ where name sameas Julian'
        query: String,
    },

    /// Load records into an in-memory store and run a query against them
    Query {
        /// JSON file holding an array of {"key", "permission", "data"} objects
        #[arg(long)]
        records: PathBuf,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Permission level granted to the query (name or number)
        #[arg(long, default_value = "self")]
        permission: String,

        /// Records buffered between the store and the printer
        #[arg(long)]
        queue_size: Option<usize>,

        /// Query text
        query: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let cli = Cli::try_parse_from(["recdb", "parse", "query a/"]).unwrap();
        assert!(matches!(cli.command, Command::Parse { query } if query == "query a/"));
    }

    #[test]
    fn test_query_command_defaults() {
        let cli = Cli::try_parse_from(["recdb", "query", "--records", "r.json", "query a/"]).unwrap();
        match cli.command {
            Command::Query {
                records,
                config,
                permission,
                queue_size,
                query,
            } => {
                assert_eq!(records, PathBuf::from("r.json"));
                assert!(config.is_none());
                assert_eq!(permission, "self");
                assert!(queue_size.is_none());
                assert_eq!(query, "query a/");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_query_requires_records() {
        assert!(Cli::try_parse_from(["recdb", "query", "query a/"]).is_err());
    }
}
