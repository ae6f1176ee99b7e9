//! End-to-end processing of one uploaded log file.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::builder::{ConnectorSessions, build_sessions};
use crate::event::ConnectorId;
use crate::idle::IdleTimeError;
use crate::metrics::{ConnectorSummary, summarize};
use crate::normalize::{RawRow, normalize_rows};
use crate::partition::{TRACKED_CONNECTORS, partition};
use crate::session::ChargingSession;

/// Where an export came from, which decides its row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Charging management system export, oldest row first.
    #[default]
    Cms,
    /// Object storage dump, newest row first.
    S3,
}

impl DataSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cms => "cms",
            Self::S3 => "s3",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cms" => Ok(Self::Cms),
            "s3" => Ok(Self::S3),
            _ => Err(format!("invalid data source: {s} (expected cms or s3)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    pub data_source: DataSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub rows_total: usize,
    pub rows_skipped: usize,
    /// Events delivered to each tracked connector, broadcasts included.
    pub events_by_connector: BTreeMap<ConnectorId, usize>,
    pub unrouted_events: usize,
    pub connectors_resolved_by_transaction: usize,
}

/// Result of processing one log file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedLog {
    pub connector1: ConnectorSummary,
    pub connector1_sessions: Vec<ChargingSession>,
    pub connector1_idle_errors: Vec<IdleTimeError>,
    pub connector2: ConnectorSummary,
    pub connector2_sessions: Vec<ChargingSession>,
    pub connector2_idle_errors: Vec<IdleTimeError>,
    pub diagnostics: Diagnostics,
}

/// Borrowed view of one connector's part of a [`ProcessedLog`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectorView<'a> {
    pub connector: ConnectorId,
    pub summary: &'a ConnectorSummary,
    pub sessions: &'a [ChargingSession],
    pub idle_errors: &'a [IdleTimeError],
}

impl ProcessedLog {
    /// Both tracked connectors in ascending order.
    #[must_use]
    pub fn connectors(&self) -> [ConnectorView<'_>; 2] {
        [
            ConnectorView {
                connector: TRACKED_CONNECTORS[0],
                summary: &self.connector1,
                sessions: &self.connector1_sessions,
                idle_errors: &self.connector1_idle_errors,
            },
            ConnectorView {
                connector: TRACKED_CONNECTORS[1],
                summary: &self.connector2,
                sessions: &self.connector2_sessions,
                idle_errors: &self.connector2_idle_errors,
            },
        ]
    }
}

/// Processes a fully-read log file into per-connector sessions and summaries.
///
/// Malformed rows are skipped and counted. Connectors are built on the rayon
/// pool; each pipeline owns its events, so the result is deterministic.
pub fn process_log(rows: &[RawRow], options: ProcessOptions) -> ProcessedLog {
    let batch = normalize_rows(rows);
    if !batch.skipped.is_empty() {
        tracing::warn!(
            skipped = batch.skipped.len(),
            total = batch.rows_total,
            "skipped malformed log rows"
        );
    }

    let mut events = batch.events;
    if options.data_source == DataSource::S3 {
        events.reverse();
    }

    let partitioned = partition(events, &TRACKED_CONNECTORS);
    let events_by_connector = partitioned
        .by_connector
        .iter()
        .map(|(connector, events)| (*connector, events.len()))
        .collect();

    let mut built: BTreeMap<ConnectorId, (ConnectorSummary, ConnectorSessions)> = partitioned
        .by_connector
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(connector, events)| {
            let sessions = build_sessions(connector, &events);
            let summary = summarize(&sessions.sessions, &sessions.idle_errors);
            (connector, (summary, sessions))
        })
        .collect();

    let mut take = |connector: ConnectorId| {
        built.remove(&connector).unwrap_or_else(|| {
            (
                ConnectorSummary::default(),
                ConnectorSessions {
                    connector,
                    ..ConnectorSessions::default()
                },
            )
        })
    };
    let (connector1, first) = take(TRACKED_CONNECTORS[0]);
    let (connector2, second) = take(TRACKED_CONNECTORS[1]);

    let diagnostics = Diagnostics {
        rows_total: batch.rows_total,
        rows_skipped: batch.skipped.len(),
        events_by_connector,
        unrouted_events: partitioned.unrouted,
        connectors_resolved_by_transaction: batch.resolved_by_transaction,
    };

    tracing::info!(
        rows = diagnostics.rows_total,
        skipped = diagnostics.rows_skipped,
        connector1_sessions = first.sessions.len(),
        connector2_sessions = second.sessions.len(),
        source = %options.data_source,
        "processed charger log"
    );

    ProcessedLog {
        connector1,
        connector1_sessions: first.sessions,
        connector1_idle_errors: first.idle_errors,
        connector2,
        connector2_sessions: second.sessions,
        connector2_idle_errors: second.idle_errors,
        diagnostics,
    }
}
