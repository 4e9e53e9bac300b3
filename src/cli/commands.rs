//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_records, record_json, write_line};
use crate::config::EngineConfig;
use crate::database::{Database, Interface};
use crate::observability::Logger;
use crate::query::{parse_query, Query};
use crate::record::{Permission, RecordRef};
use crate::storage::HashMapDb;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Parse { query } => parse(&query),
        Command::Query {
            records,
            config,
            permission,
            queue_size,
            query: text,
        } => query(&records, config.as_deref(), &permission, queue_size, &text),
    }
}

/// Parse a query and print its canonical form
pub fn parse(text: &str) -> CliResult<()> {
    let query = parse_query(text)?;
    write_line(&query.print())
}

/// Run a query over the records of a file
///
/// Matches are printed as JSON lines in the order the store yields them.
pub fn query(
    records_path: &Path,
    config_path: Option<&Path>,
    permission: &str,
    queue_size: Option<usize>,
    text: &str,
) -> CliResult<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Logger::set_min_severity(config.log_severity()?);

    let permission: Permission = permission.parse().map_err(CliError::input_error)?;
    let query = parse_query(text)?;
    let records = read_records(records_path)?;
    let queue_size = queue_size.unwrap_or(config.default_queue_size);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;
    rt.block_on(run_query(config, records, permission, query, queue_size))
}

async fn run_query(
    config: EngineConfig,
    records: Vec<RecordRef>,
    permission: Permission,
    query: Query,
    queue_size: usize,
) -> CliResult<()> {
    // the store only lives for this command, so it is always loaded
    let config = EngineConfig {
        read_only: false,
        ..config
    };
    let db: Arc<dyn Database> = Arc::new(HashMapDb::new("cli", config));
    db.start().await?;

    let mut batch = db.batch_put().await?;
    for record in records {
        batch.put(record).await?;
    }
    batch.finish().await?;

    let interface = Interface::new(db.clone(), permission);
    let mut iter = interface.query(query, queue_size).await?;
    while let Some(record) = iter.next().await {
        write_line(&record_json(record.as_ref()).to_string())?;
    }

    for warning in iter.warnings() {
        Logger::warn("QUERY_WARNING", &[("warning", warning.as_str())]);
    }
    if let Some(err) = iter.err() {
        return Err(err.into());
    }

    db.stop().await?;
    Ok(())
}
