//! File and stdout handling for the CLI
//!
//! - Input: a JSON array of records
//! - Output: one JSON object per line on stdout

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use super::errors::{CliError, CliResult};
use crate::record::{MemRecord, Permission, Record, RecordRef};

/// One entry of a records file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordEntry {
    key: String,
    #[serde(default)]
    permission: Permission,
    data: Value,
}

/// Load records from a JSON file
pub fn read_records(path: &Path) -> CliResult<Vec<RecordRef>> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::io_error(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_records(&content)
}

fn parse_records(content: &str) -> CliResult<Vec<RecordRef>> {
    let entries: Vec<RecordEntry> = serde_json::from_str(content)?;
    Ok(entries
        .into_iter()
        .map(|e| MemRecord::new(e.key, e.permission).with_object(e.data).into_ref())
        .collect())
}

/// JSON form of a record for output
pub fn record_json(record: &dyn Record) -> Value {
    json!({
        "key": record.key(),
        "permission": record.permission(),
        "data": record.object(),
    })
}

/// Write one line to stdout
pub fn write_line(line: &str) -> CliResult<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}
