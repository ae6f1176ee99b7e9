//! Core domain logic for charger log analytics.
//!
//! This crate turns a batch of OCPP log rows into charging sessions and
//! per-connector summaries:
//! - Normalization: decoding raw rows into typed events
//! - Partitioning: grouping events per connector in chronological order
//! - Session building: the transaction state machine and idle-time errors
//! - Metrics: per-connector aggregates and reason histograms

pub mod builder;
pub mod error_code;
pub mod event;
pub mod idle;
pub mod metrics;
pub mod normalize;
pub mod partition;
mod payload;
pub mod process;
pub mod session;
mod timestamp;

pub use builder::{ConnectorSessions, SessionBuilder, build_sessions};
pub use error_code::{ErrorCategory, ErrorCode, classify, classify_idle};
pub use event::{Command, ConnectorId, MeterSample, Payload, RawEvent};
pub use idle::{IdleTimeError, dedup_idle_errors};
pub use metrics::{ConnectorSummary, summarize};
pub use normalize::{NormalizeError, NormalizedBatch, RawRow, normalize_row, normalize_rows};
pub use partition::{Partitioned, TRACKED_CONNECTORS, partition};
pub use process::{
    ConnectorView, DataSource, Diagnostics, ProcessOptions, ProcessedLog, process_log,
};
pub use session::{ChargingSession, CloseReason, Outcome};
pub use timestamp::{TimestampError, parse_timestamp};
