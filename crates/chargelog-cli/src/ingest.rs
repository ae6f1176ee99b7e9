//! Reading log files into raw rows.
//!
//! The format is chosen by file extension. CSV files must carry a header
//! row; JSON files hold an array of objects; JSONL files hold one object per
//! line.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chargelog_core::RawRow;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV")]
    Csv(#[from] csv::Error),
    #[error("malformed JSON")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON array of objects")]
    NotAnArray,
    #[error("unsupported log format {0:?} (expected csv, json, jsonl, or ndjson)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Csv,
    Json,
    JsonLines,
}

impl LogFormat {
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::JsonLines),
            _ => Err(IngestError::UnsupportedFormat(extension)),
        }
    }
}

/// Reads every row of a log file.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>, IngestError> {
    let format = LogFormat::from_path(path)?;
    let io_error = |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let rows = match format {
        LogFormat::Csv => parse_csv(File::open(path).map_err(io_error)?)?,
        LogFormat::Json => parse_json(&std::fs::read_to_string(path).map_err(io_error)?)?,
        LogFormat::JsonLines => parse_json_lines(&std::fs::read_to_string(path).map_err(io_error)?),
    };
    tracing::debug!(path = %path.display(), rows = rows.len(), ?format, "read log file");
    Ok(rows)
}

/// Parses CSV with a header row. Cells are decoded lossily so a stray
/// non-UTF-8 byte does not reject the whole file.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<RawRow>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|header| String::from_utf8_lossy(header).trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let pairs = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, cell)| (header.clone(), String::from_utf8_lossy(cell).into_owned()));
        rows.push(RawRow::from_pairs(pairs));
    }
    Ok(rows)
}

/// Parses a JSON array of row objects. Non-object elements are skipped.
pub fn parse_json(text: &str) -> Result<Vec<RawRow>, IngestError> {
    let Value::Array(items) = serde_json::from_str(text)? else {
        return Err(IngestError::NotAnArray);
    };

    let total = items.len();
    let rows: Vec<RawRow> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(RawRow::new(map)),
            _ => None,
        })
        .collect();
    if rows.len() < total {
        tracing::warn!(skipped = total - rows.len(), "skipped non-object JSON rows");
    }
    Ok(rows)
}

/// Parses one JSON object per line. Blank and malformed lines are skipped.
pub fn parse_json_lines(text: &str) -> Vec<RawRow> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(
            |(index, line)| match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(map)) => Some(RawRow::new(map)),
                Ok(_) => {
                    tracing::warn!(line = index + 1, "skipping non-object JSON line");
                    None
                }
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "skipping malformed JSON line");
                    None
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use chargelog_core::{Command, ConnectorId, normalize_row};

    #[test]
    fn csv_rows_keep_embedded_payloads() {
        let csv = "\
command,real_time,connectorId,payLoadData
StartTransactionRequest,10/12/2024 10:00:00,1,\"{'connectorId': 1, 'meterStart': 1000}\"
Heartbeat,10/12/2024 10:01:00
";

        let rows = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        let event = normalize_row(0, &rows[0]).unwrap();
        assert_eq!(event.command, Command::StartTransaction);
        assert_eq!(event.connector, ConnectorId(1));
        assert_eq!(event.payload.number("meterStart"), Some(1000.0));

        let heartbeat = normalize_row(1, &rows[1]).unwrap();
        assert_eq!(heartbeat.connector, ConnectorId::CHARGER);
    }

    #[test]
    fn csv_tolerates_invalid_utf8() {
        let mut bytes = b"command,real_time\nHeartbeat,10/12/2024 10:00:00 ".to_vec();
        bytes.push(0xFF);
        bytes.push(b'\n');

        let rows = parse_csv(bytes.as_slice()).unwrap();

        assert_eq!(rows.len(), 1);
        assert!(normalize_row(0, &rows[0]).is_err());
    }

    #[test]
    fn json_array_skips_non_objects() {
        let rows = parse_json(r#"[{"command": "Heartbeat"}, 3, "x", {"command": "Boot"}]"#).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn json_must_be_an_array() {
        assert!(matches!(
            parse_json(r#"{"command": "Heartbeat"}"#),
            Err(IngestError::NotAnArray)
        ));
        assert!(matches!(parse_json("[1,"), Err(IngestError::Json(_))));
    }

    #[test]
    fn json_lines_skip_bad_lines() {
        let text = "{\"command\": \"Heartbeat\"}\n\nnot json\n[1]\n{\"command\": \"Boot\"}\n";
        assert_eq!(parse_json_lines(text).len(), 2);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            LogFormat::from_path(Path::new("log.CSV")).unwrap(),
            LogFormat::Csv
        );
        assert_eq!(
            LogFormat::from_path(Path::new("log.ndjson")).unwrap(),
            LogFormat::JsonLines
        );
        assert!(matches!(
            LogFormat::from_path(Path::new("log.xlsx")),
            Err(IngestError::UnsupportedFormat(ext)) if ext == "xlsx"
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_rows(Path::new("/nonexistent/log.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/log.csv"));
    }
}
