//! Timestamp parsing for charger log exports.
//!
//! Exports mix ISO 8601 stamps with locale-formatted `D/M/YYYY H:MM:SS`
//! values. Day-first is assumed whenever the order is ambiguous.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Zone suffix some exports append to local wall-clock times.
const ZONE_SUFFIX: &str = " IST";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M:%S %p",
    "%d/%m/%Y %I:%M %p",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,
    #[error("unrecognized timestamp: {0:?}")]
    Unrecognized(String),
}

/// Parses a log timestamp into wall-clock time.
///
/// Offset-bearing values keep the wall-clock time as written so they order
/// consistently with naive local stamps from the same export.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, TimestampError> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return Err(TimestampError::Empty);
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(&cleaned) {
        return Ok(with_offset.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&cleaned, format).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|format| {
                NaiveDate::parse_from_str(&cleaned, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
        })
        .ok_or_else(|| TimestampError::Unrecognized(cleaned.clone()))
}

fn clean(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_zone = trimmed
        .strip_suffix(ZONE_SUFFIX)
        .unwrap_or(trimmed)
        .replace(',', "");
    without_zone.split_whitespace().collect::<Vec<_>>().join(" ")
}
