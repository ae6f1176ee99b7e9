//! Upload command: analyze a log file and store the result.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chargelog_core::DataSource;
use chargelog_db::{Database, NewUpload};
use chrono::Utc;

use crate::commands::process::analyze;
use crate::render::format_processed;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    path: &Path,
    owner: &str,
    data_source: DataSource,
) -> Result<i64> {
    let result = analyze(path, data_source)?;
    let filename = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());

    let id = db
        .insert_upload(&NewUpload {
            owner,
            filename: &filename,
            data_source,
            uploaded_at: Utc::now(),
            result: &result,
        })
        .context("failed to store upload")?;

    tracing::info!(id, owner, filename = %filename, "upload stored");
    writeln!(writer, "Stored upload {id}: {filename} ({data_source})")?;
    write!(writer, "{}", format_processed(&result))?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_result_under_owner() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("site-a.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"command": "StartTransactionRequest", "timestamp": "2024-12-10T10:00:00Z", "connectorId": 2, "payload": {"meterStart": 0}}"#,
                "\n",
                r#"{"command": "StopTransactionRequest", "timestamp": "2024-12-10T10:45:00Z", "connectorId": 2, "payload": {"meterStop": 9000}}"#,
                "\n",
            ),
        )
        .unwrap();
        let mut db = Database::open_in_memory().unwrap();

        let mut output = Vec::new();
        let id = run(&mut output, &mut db, &path, "ops", DataSource::Cms).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with(&format!("Stored upload {id}: site-a.jsonl (cms)")));

        let record = db.get_upload(id).unwrap().unwrap();
        assert_eq!(record.owner, "ops");
        assert_eq!(record.filename, "site-a.jsonl");
        let result = record.result().unwrap();
        assert_eq!(result.connector2.total_sessions, 1);
        assert_eq!(result.connector2_sessions[0].energy_kwh, Some(9.0));
    }
}
