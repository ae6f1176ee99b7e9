//! Reconstructed charging sessions and their outcome policy.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error_code::ErrorCode;
use crate::event::ConnectorId;

/// Sessions shorter than this never count as successful.
pub const MIN_SESSION_MINUTES: f64 = 1.0;

/// Verdict for a finalized session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Successful,
    Failed,
    Incomplete,
    Interrupted,
}

impl Outcome {
    /// Applies the outcome policy in priority order: any error fails the
    /// session, then charging for longer than a minute succeeds, then short
    /// or unbounded sessions are incomplete, and everything else was
    /// interrupted.
    #[must_use]
    pub fn classify(has_errors: bool, had_charging: bool, duration_minutes: Option<f64>) -> Self {
        let duration = duration_minutes.unwrap_or(0.0);
        if has_errors {
            Self::Failed
        } else if had_charging && duration > MIN_SESSION_MINUTES {
            Self::Successful
        } else if duration < MIN_SESSION_MINUTES {
            Self::Incomplete
        } else {
            Self::Interrupted
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Successful => "Successful",
            Self::Failed => "Failed",
            Self::Incomplete => "Incomplete",
            Self::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Successful" => Ok(Self::Successful),
            "Failed" => Ok(Self::Failed),
            "Incomplete" => Ok(Self::Incomplete),
            "Interrupted" => Ok(Self::Interrupted),
            _ => Err(format!("unknown outcome: {s}")),
        }
    }
}

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloseReason {
    /// A matching `StopTransaction` arrived.
    StopTransaction,
    /// Another `StartTransaction` arrived while the session was open.
    NewStart,
    /// The log ended while the session was open.
    EndOfStream,
}

/// A charging session on one connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSession {
    pub connector_id: ConnectorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_tag: Option<String>,
    pub start_time: NaiveDateTime,
    pub stop_time: Option<NaiveDateTime>,
    /// Wh.
    pub meter_start: Option<f64>,
    /// Wh.
    pub meter_stop: Option<f64>,
    pub energy_kwh: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub avg_power_kw: Option<f64>,
    /// Peak instantaneous power from in-window meter values.
    pub max_power_kw: Option<f64>,
    pub avg_voltage_v: Option<f64>,
    pub avg_current_a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub errors: BTreeSet<ErrorCode>,
    pub had_charging: bool,
    pub outcome: Outcome,
    /// Incomplete without ever charging or reporting an error.
    pub precharging_failure: bool,
    pub closed_by: CloseReason,
}
