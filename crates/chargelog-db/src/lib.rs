//! Storage layer for processed uploads.
//!
//! One row per uploaded log file, holding the file's metadata and the full
//! [`ProcessedLog`] as JSON. Raw log rows are never stored. The store is
//! append-only apart from explicit deletes.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Use one instance per thread or guard it with a `Mutex`.
//!
//! # Timestamp Format
//!
//! Upload times are stored as RFC 3339 TEXT in UTC with millisecond
//! precision, so lexicographic order matches chronological order.

use std::path::Path;

use chargelog_core::{DataSource, ProcessedLog};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored result could not be decoded.
    #[error("invalid result json for upload {upload_id}: {source}")]
    ResultJson {
        upload_id: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize result: {0}")]
    Serialize(#[source] serde_json::Error),
    /// A stored column holds a value this version cannot interpret.
    #[error("invalid {column} for upload {upload_id}: {value}")]
    InvalidColumn {
        upload_id: i64,
        column: &'static str,
        value: String,
    },
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

/// An upload about to be stored.
#[derive(Debug, Clone, Copy)]
pub struct NewUpload<'a> {
    pub owner: &'a str,
    pub filename: &'a str,
    pub data_source: DataSource,
    pub uploaded_at: DateTime<Utc>,
    pub result: &'a ProcessedLog,
}

/// Upload metadata as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub id: i64,
    pub owner: String,
    pub filename: String,
    pub data_source: DataSource,
    pub uploaded_at: DateTime<Utc>,
    result_json: String,
}

impl UploadRecord {
    /// Decodes the stored processing result.
    pub fn result(&self) -> Result<ProcessedLog, DbError> {
        serde_json::from_str(&self.result_json).map_err(|source| DbError::ResultJson {
            upload_id: self.id,
            source,
        })
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database, destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Idempotent schema setup.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS uploads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                filename TEXT NOT NULL,
                data_source TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                result_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_uploads_owner ON uploads(owner, uploaded_at);
            ",
        )?;
        Ok(())
    }

    /// Stores a processed upload and returns its id.
    pub fn insert_upload(&mut self, upload: &NewUpload<'_>) -> Result<i64, DbError> {
        let result_json = serde_json::to_string(upload.result).map_err(DbError::Serialize)?;
        self.conn.execute(
            "
            INSERT INTO uploads (owner, filename, data_source, uploaded_at, result_json)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![
                upload.owner,
                upload.filename,
                upload.data_source.as_str(),
                format_timestamp(upload.uploaded_at),
                result_json,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, owner = upload.owner, filename = upload.filename, "stored upload");
        Ok(id)
    }

    /// Fetches one upload by id.
    pub fn get_upload(&self, id: i64) -> Result<Option<UploadRecord>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, owner, filename, data_source, uploaded_at, result_json
                FROM uploads
                WHERE id = ?
                ",
                params![id],
                read_row,
            )
            .optional()?;
        row.map(StoredRow::into_record).transpose()
    }

    /// Lists uploads newest first, optionally restricted to one owner.
    pub fn list_uploads(&self, owner: Option<&str>) -> Result<Vec<UploadRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, owner, filename, data_source, uploaded_at, result_json
            FROM uploads
            WHERE ?1 IS NULL OR owner = ?1
            ORDER BY uploaded_at DESC, id DESC
            ",
        )?;
        let rows = stmt.query_map(params![owner], read_row)?;
        let mut uploads = Vec::new();
        for row in rows {
            uploads.push(row?.into_record()?);
        }
        Ok(uploads)
    }

    /// Deletes an upload. Returns whether a row was removed.
    pub fn delete_upload(&mut self, id: i64) -> Result<bool, DbError> {
        let removed = self
            .conn
            .execute("DELETE FROM uploads WHERE id = ?", params![id])?;
        Ok(removed > 0)
    }
}

struct StoredRow {
    id: i64,
    owner: String,
    filename: String,
    data_source: String,
    uploaded_at: String,
    result_json: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: row.get(0)?,
        owner: row.get(1)?,
        filename: row.get(2)?,
        data_source: row.get(3)?,
        uploaded_at: row.get(4)?,
        result_json: row.get(5)?,
    })
}

impl StoredRow {
    fn into_record(self) -> Result<UploadRecord, DbError> {
        let data_source = self
            .data_source
            .parse()
            .map_err(|_| DbError::InvalidColumn {
                upload_id: self.id,
                column: "data_source",
                value: self.data_source.clone(),
            })?;
        let uploaded_at = DateTime::parse_from_rfc3339(&self.uploaded_at)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|_| DbError::InvalidColumn {
                upload_id: self.id,
                column: "uploaded_at",
                value: self.uploaded_at.clone(),
            })?;
        Ok(UploadRecord {
            id: self.id,
            owner: self.owner,
            filename: self.filename,
            data_source,
            uploaded_at,
            result_json: self.result_json,
        })
    }
}

/// RFC 3339 in UTC with millisecond precision.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chargelog_core::{ConnectorSummary, ProcessOptions, process_log};
    use chrono::TimeZone;

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn sample_result() -> ProcessedLog {
        let mut result = process_log(&[], ProcessOptions::default());
        result.connector1 = ConnectorSummary {
            total_sessions: 3,
            successful_sessions: 2,
            failed_sessions: 1,
            total_energy_kwh: 42.5,
            ..ConnectorSummary::default()
        };
        result
            .connector1
            .failed_session_reasons
            .insert("OtherError:EmergencyStop".to_string(), 1);
        result
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 10, hour, 0, 0).unwrap()
    }

    fn insert(db: &mut Database, owner: &str, hour: u32, result: &ProcessedLog) -> i64 {
        db.insert_upload(&NewUpload {
            owner,
            filename: "charger.csv",
            data_source: DataSource::Cms,
            uploaded_at: at(hour),
            result,
        })
        .expect("insert upload")
    }

    #[test]
    fn open_in_memory_database() {
        assert!(Database::open_in_memory().is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "uploads"),
            vec![
                "id",
                "owner",
                "filename",
                "data_source",
                "uploaded_at",
                "result_json"
            ]
        );
    }

    #[test]
    fn stored_result_roundtrips() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let result = sample_result();

        let id = insert(&mut db, "ops@example.com", 9, &result);
        let record = db.get_upload(id).expect("get upload").expect("upload exists");

        assert_eq!(record.owner, "ops@example.com");
        assert_eq!(record.filename, "charger.csv");
        assert_eq!(record.data_source, DataSource::Cms);
        assert_eq!(record.uploaded_at, at(9));
        assert_eq!(record.result().expect("decode result"), result);
    }

    #[test]
    fn missing_upload_is_none() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert!(db.get_upload(404).expect("query").is_none());
    }

    #[test]
    fn list_filters_by_owner_newest_first() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let result = sample_result();
        let early = insert(&mut db, "alice", 8, &result);
        let late = insert(&mut db, "alice", 12, &result);
        let other = insert(&mut db, "bob", 10, &result);

        let alice: Vec<i64> = db
            .list_uploads(Some("alice"))
            .expect("list")
            .iter()
            .map(|upload| upload.id)
            .collect();
        assert_eq!(alice, vec![late, early]);

        let everyone: Vec<i64> = db
            .list_uploads(None)
            .expect("list")
            .iter()
            .map(|upload| upload.id)
            .collect();
        assert_eq!(everyone, vec![late, other, early]);
    }

    #[test]
    fn delete_removes_only_the_target() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let result = sample_result();
        let keep = insert(&mut db, "alice", 8, &result);
        let removed = insert(&mut db, "alice", 9, &result);

        assert!(db.delete_upload(removed).expect("delete"));
        assert!(!db.delete_upload(removed).expect("delete again"));
        assert!(db.get_upload(keep).expect("get").is_some());
    }

    #[test]
    fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chargelog.db");
        let result = sample_result();

        let id = {
            let mut db = Database::open(&path).expect("open db");
            insert(&mut db, "alice", 8, &result)
        };

        let db = Database::open(&path).expect("reopen db");
        let record = db.get_upload(id).expect("get").expect("exists");
        assert_eq!(record.result().expect("decode"), result);
    }

    #[test]
    fn format_timestamp_uses_millis_utc() {
        assert_eq!(format_timestamp(at(9)), "2024-12-10T09:00:00.000Z");
    }
}
