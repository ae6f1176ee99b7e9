//! Raw log rows to typed events.
//!
//! Column names vary between exports, so every field is looked up through an
//! alias list first and then by a case and punctuation insensitive match.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::event::{Command, ConnectorId, Payload, RawEvent};
use crate::payload::{decode_payload, payload_object};
use crate::timestamp::{TimestampError, parse_timestamp};

const COMMAND_ALIASES: &[&str] = &[
    "command",
    "Command",
    "action",
    "messageType",
    "message_type",
    "type",
];
const TIMESTAMP_ALIASES: &[&str] = &[
    "real_time",
    "realTime",
    "timestamp",
    "time",
    "received_time",
    "date_time",
];
const CONNECTOR_ALIASES: &[&str] = &["connectorId", "connector_id", "connector"];
const PAYLOAD_ALIASES: &[&str] = &["payLoadData", "payloadData", "payload", "data"];

/// One heterogeneous input record, column name to cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(Map<String, Value>);

impl RawRow {
    #[must_use]
    pub const fn new(columns: Map<String, Value>) -> Self {
        Self(columns)
    }

    /// Builds a row from `(column, text)` pairs, as read from a CSV record.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), Value::String(value.into())))
                .collect(),
        )
    }

    /// Looks up a cell by alias, falling back to a normalized key match.
    fn find(&self, aliases: &[&str]) -> Option<&Value> {
        if let Some(value) = aliases
            .iter()
            .find_map(|alias| self.0.get(*alias))
            .filter(|value| !is_blank(value))
        {
            return Some(value);
        }

        let normalized: Vec<String> = aliases.iter().map(|alias| normalize_key(alias)).collect();
        self.0.iter().find_map(|(key, value)| {
            let key = normalize_key(key);
            (normalized.contains(&key) && !is_blank(value)).then_some(value)
        })
    }

    fn text(&self, aliases: &[&str]) -> Option<String> {
        match self.find(aliases)? {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for RawRow {
    fn from(columns: Map<String, Value>) -> Self {
        Self(columns)
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphanumeric)
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan")
        }
        _ => false,
    }
}

/// Why a row could not become an event. Such rows are skipped, not fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("row {row}: missing command")]
    MissingCommand { row: usize },
    #[error("row {row}: missing timestamp")]
    MissingTimestamp { row: usize },
    #[error("row {row}: {source}")]
    InvalidTimestamp {
        row: usize,
        #[source]
        source: TimestampError,
    },
}

impl NormalizeError {
    #[must_use]
    pub const fn row(&self) -> usize {
        match self {
            Self::MissingCommand { row }
            | Self::MissingTimestamp { row }
            | Self::InvalidTimestamp { row, .. } => *row,
        }
    }
}

/// Result of normalizing a whole file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    /// Usable events in input order.
    pub events: Vec<RawEvent>,
    pub rows_total: usize,
    pub skipped: Vec<NormalizeError>,
    /// Events whose connector was recovered from a `transactionId` seen on
    /// another row.
    pub resolved_by_transaction: usize,
}

/// Normalizes a single row without cross-row connector backfill.
pub fn normalize_row(row: usize, raw: &RawRow) -> Result<RawEvent, NormalizeError> {
    decode_row(row, raw).map(|decoded| decoded.event)
}

/// Normalizes every row of a file.
///
/// Rows lacking a connector take the connector seen with the same
/// `transactionId` elsewhere in the file. The first non-zero connector
/// observed for a transaction wins.
pub fn normalize_rows(rows: &[RawRow]) -> NormalizedBatch {
    let mut decoded = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();

    for (index, raw) in rows.iter().enumerate() {
        match decode_row(index, raw) {
            Ok(row) => decoded.push(row),
            Err(err) => {
                tracing::debug!(row = index, error = %err, "skipping malformed log row");
                skipped.push(err);
            }
        }
    }

    let mut connector_by_transaction: HashMap<String, ConnectorId> = HashMap::new();
    for row in &decoded {
        if row.connector_known && !row.event.connector.is_charger_wide() {
            if let Some(transaction) = row.event.payload.text("transactionId") {
                connector_by_transaction
                    .entry(transaction)
                    .or_insert(row.event.connector);
            }
        }
    }

    let mut resolved_by_transaction = 0;
    let events = decoded
        .into_iter()
        .map(|row| {
            let mut event = row.event;
            if !row.connector_known {
                let learned = event
                    .payload
                    .text("transactionId")
                    .and_then(|transaction| connector_by_transaction.get(&transaction));
                if let Some(connector) = learned {
                    event.connector = *connector;
                    resolved_by_transaction += 1;
                }
            }
            event
        })
        .collect();

    NormalizedBatch {
        events,
        rows_total: rows.len(),
        skipped,
        resolved_by_transaction,
    }
}

struct DecodedRow {
    event: RawEvent,
    connector_known: bool,
}

fn decode_row(row: usize, raw: &RawRow) -> Result<DecodedRow, NormalizeError> {
    let command = raw
        .text(COMMAND_ALIASES)
        .filter(|command| !command.is_empty())
        .map(|command| Command::parse(&command))
        .ok_or(NormalizeError::MissingCommand { row })?;

    let payload = raw
        .find(PAYLOAD_ALIASES)
        .and_then(|cell| match cell {
            Value::String(text) => decode_payload(text),
            other => payload_object(other.clone()),
        })
        .map(Payload::new)
        .unwrap_or_default();

    let stamp = raw
        .text(TIMESTAMP_ALIASES)
        .or_else(|| payload.text("timestamp"))
        .ok_or(NormalizeError::MissingTimestamp { row })?;
    let timestamp = parse_timestamp(&stamp)
        .map_err(|source| NormalizeError::InvalidTimestamp { row, source })?;

    let connector = raw
        .find(CONNECTOR_ALIASES)
        .and_then(parse_connector)
        .or_else(|| payload.get("connectorId").and_then(parse_connector));

    Ok(DecodedRow {
        event: RawEvent {
            row,
            command,
            timestamp,
            connector: connector.unwrap_or(ConnectorId::CHARGER),
            payload,
        },
        connector_known: connector.is_some(),
    })
}

/// Accepts `1`, `"1"`, and the `1.0` floats spreadsheet exports produce.
fn parse_connector(value: &Value) -> Option<ConnectorId> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !(number.is_finite() && number >= 0.0 && number.fract() == 0.0) {
        return None;
    }
    if number > f64::from(u32::MAX) {
        return None;
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "range and integrality checked above"
    )]
    let id = number as u32;
    Some(ConnectorId(id))
}
