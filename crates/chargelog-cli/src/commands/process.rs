//! Process command: analyze a log file without storing it.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chargelog_core::{DataSource, ProcessOptions, ProcessedLog, process_log};

use crate::ingest::read_rows;
use crate::render::format_processed;

/// Reads and processes one log file.
pub fn analyze(path: &Path, data_source: DataSource) -> Result<ProcessedLog> {
    let rows = read_rows(path).with_context(|| format!("failed to ingest {}", path.display()))?;
    Ok(process_log(&rows, ProcessOptions { data_source }))
}

pub fn run<W: Write>(writer: &mut W, path: &Path, data_source: DataSource, json: bool) -> Result<()> {
    let result = analyze(path, data_source)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?;
    } else {
        writeln!(writer, "{} ({data_source})", path.display())?;
        write!(writer, "{}", format_processed(&result))?;
    }
    Ok(())
}
