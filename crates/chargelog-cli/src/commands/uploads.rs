//! Stored upload commands: list, show, delete.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chargelog_db::{Database, format_timestamp};
use serde::Serialize;

use crate::render::{format_processed, format_uploads};

/// Upload metadata for JSON listings.
#[derive(Debug, Serialize)]
struct UploadSummary<'a> {
    id: i64,
    owner: &'a str,
    filename: &'a str,
    data_source: &'static str,
    uploaded_at: String,
}

pub fn list<W: Write>(writer: &mut W, db: &Database, owner: Option<&str>, json: bool) -> Result<()> {
    let uploads = db.list_uploads(owner).context("failed to list uploads")?;

    if json {
        let summaries: Vec<UploadSummary<'_>> = uploads
            .iter()
            .map(|upload| UploadSummary {
                id: upload.id,
                owner: &upload.owner,
                filename: &upload.filename,
                data_source: upload.data_source.as_str(),
                uploaded_at: format_timestamp(upload.uploaded_at),
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&summaries)?)?;
    } else {
        write!(writer, "{}", format_uploads(&uploads))?;
    }
    Ok(())
}

pub fn show<W: Write>(writer: &mut W, db: &Database, id: i64, json: bool) -> Result<()> {
    let Some(upload) = db.get_upload(id).context("failed to load upload")? else {
        bail!("upload {id} not found");
    };
    let result = upload.result()?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?;
    } else {
        writeln!(
            writer,
            "Upload {}: {} by {} at {} ({})",
            upload.id,
            upload.filename,
            upload.owner,
            format_timestamp(upload.uploaded_at),
            upload.data_source
        )?;
        write!(writer, "{}", format_processed(&result))?;
    }
    Ok(())
}

pub fn delete<W: Write>(writer: &mut W, db: &mut Database, id: i64) -> Result<()> {
    if !db.delete_upload(id).context("failed to delete upload")? {
        bail!("upload {id} not found");
    }
    writeln!(writer, "Deleted upload {id}")?;
    Ok(())
}
