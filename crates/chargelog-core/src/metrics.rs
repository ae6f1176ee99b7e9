//! Per-connector aggregate statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::idle::IdleTimeError;
use crate::session::{ChargingSession, Outcome};

/// Summary of one connector's sessions for one upload.
///
/// Keys serialize with the labels used in charger reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSummary {
    #[serde(rename = "Total Sessions")]
    pub total_sessions: usize,
    #[serde(rename = "Successful Sessions")]
    pub successful_sessions: usize,
    #[serde(rename = "Failed Sessions")]
    pub failed_sessions: usize,
    #[serde(rename = "Incomplete Sessions")]
    pub incomplete_sessions: usize,
    #[serde(rename = "Interrupted Sessions")]
    pub interrupted_sessions: usize,
    #[serde(rename = "Precharging Failures")]
    pub precharging_failures: usize,
    #[serde(rename = "Idle Time Error Count")]
    pub idle_time_error_count: usize,
    #[serde(rename = "Total Energy (kWh)")]
    pub total_energy_kwh: f64,
    #[serde(rename = "Average Energy per Session (kWh)")]
    pub average_energy_kwh: f64,
    #[serde(rename = "Total Duration (hours)")]
    pub total_duration_hours: f64,
    #[serde(rename = "Average Duration (minutes)")]
    pub average_duration_minutes: f64,
    #[serde(rename = "Average Power (kW)")]
    pub average_power_kw: f64,
    #[serde(rename = "Peak Power (kW)")]
    pub peak_power_kw: f64,
    /// Canonical error code to number of failed sessions that observed it.
    #[serde(rename = "Failed Session Reasons")]
    pub failed_session_reasons: BTreeMap<String, usize>,
    /// Canonical error code to number of successful sessions that observed it.
    #[serde(rename = "Successful Session Errors")]
    pub successful_session_errors: BTreeMap<String, usize>,
}

/// Aggregates sessions and idle errors into a summary.
///
/// Undefined energy, duration, and power are left out of sums and means.
/// Means over empty sets are zero.
pub fn summarize(sessions: &[ChargingSession], idle_errors: &[IdleTimeError]) -> ConnectorSummary {
    let mut summary = ConnectorSummary {
        total_sessions: sessions.len(),
        idle_time_error_count: idle_errors.len(),
        ..ConnectorSummary::default()
    };

    let mut durations = Vec::new();
    let mut powers = Vec::new();

    for session in sessions {
        let histogram = match session.outcome {
            Outcome::Successful => {
                summary.successful_sessions += 1;
                Some(&mut summary.successful_session_errors)
            }
            Outcome::Failed => {
                summary.failed_sessions += 1;
                Some(&mut summary.failed_session_reasons)
            }
            Outcome::Incomplete => {
                summary.incomplete_sessions += 1;
                None
            }
            Outcome::Interrupted => {
                summary.interrupted_sessions += 1;
                None
            }
        };
        if let Some(histogram) = histogram {
            for code in &session.errors {
                *histogram.entry(code.canonical()).or_default() += 1;
            }
        }

        if session.precharging_failure {
            summary.precharging_failures += 1;
        }
        if let Some(energy) = session.energy_kwh {
            summary.total_energy_kwh += energy;
        }
        if let Some(minutes) = session.duration_minutes {
            durations.push(minutes);
        }
        if let Some(power) = session.avg_power_kw.filter(|power| *power > 0.0) {
            powers.push(power);
        }
        if let Some(peak) = session.max_power_kw {
            summary.peak_power_kw = summary.peak_power_kw.max(peak);
        }
    }

    let total_minutes: f64 = durations.iter().sum();
    summary.average_energy_kwh = ratio(summary.total_energy_kwh, sessions.len());
    summary.total_duration_hours = total_minutes / 60.0;
    summary.average_duration_minutes = ratio(total_minutes, durations.len());
    summary.average_power_kw = ratio(powers.iter().sum(), powers.len());
    summary
}

#[expect(
    clippy::cast_precision_loss,
    reason = "session counts are far below f64 integer precision"
)]
fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use chrono::NaiveDate;

    use crate::error_code::ErrorCode;
    use crate::event::ConnectorId;
    use crate::session::CloseReason;

    fn session(outcome: Outcome) -> ChargingSession {
        ChargingSession {
            connector_id: ConnectorId(1),
            transaction_id: None,
            id_tag: None,
            start_time: NaiveDate::from_ymd_opt(2024, 12, 10)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            stop_time: None,
            meter_start: None,
            meter_stop: None,
            energy_kwh: None,
            duration_minutes: None,
            avg_power_kw: None,
            max_power_kw: None,
            avg_voltage_v: None,
            avg_current_a: None,
            stop_reason: None,
            errors: BTreeSet::new(),
            had_charging: false,
            outcome,
            precharging_failure: false,
            closed_by: CloseReason::StopTransaction,
        }
    }

    fn with_metrics(
        outcome: Outcome,
        energy: f64,
        minutes: f64,
        peak: f64,
    ) -> ChargingSession {
        ChargingSession {
            energy_kwh: Some(energy),
            duration_minutes: Some(minutes),
            avg_power_kw: Some(energy / (minutes / 60.0)),
            max_power_kw: Some(peak),
            ..session(outcome)
        }
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "empty aggregates are exactly zero")]
    fn empty_input_is_all_zero() {
        let summary = summarize(&[], &[]);

        assert_eq!(summary, ConnectorSummary::default());
        assert_eq!(summary.average_power_kw, 0.0);
        assert!(!summary.average_duration_minutes.is_nan());
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "inputs chosen to be exact in binary")]
    fn aggregates_defined_values_only() {
        let sessions = vec![
            with_metrics(Outcome::Successful, 25.0, 30.0, 52.5),
            with_metrics(Outcome::Interrupted, 5.0, 90.0, 7.0),
            ChargingSession {
                precharging_failure: true,
                ..session(Outcome::Incomplete)
            },
        ];

        let summary = summarize(&sessions, &[]);

        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.successful_sessions, 1);
        assert_eq!(summary.interrupted_sessions, 1);
        assert_eq!(summary.incomplete_sessions, 1);
        assert_eq!(summary.precharging_failures, 1);
        assert_eq!(summary.total_energy_kwh, 30.0);
        assert_eq!(summary.average_energy_kwh, 10.0);
        assert_eq!(summary.total_duration_hours, 2.0);
        assert_eq!(summary.average_duration_minutes, 60.0);
        assert!((summary.average_power_kw - (50.0 + 5.0 / 1.5) / 2.0).abs() < 1e-9);
        assert_eq!(summary.peak_power_kw, 52.5);
    }

    #[test]
    fn failed_reasons_count_each_distinct_code() {
        let failed = |codes: &[ErrorCode]| ChargingSession {
            errors: codes.iter().cloned().collect(),
            ..session(Outcome::Failed)
        };
        let sessions = vec![
            failed(&[
                ErrorCode::bare("GroundFailure"),
                ErrorCode::compound("OtherError", "EmergencyStop"),
            ]),
            failed(&[ErrorCode::bare("GroundFailure")]),
        ];

        let summary = summarize(&sessions, &[]);

        assert_eq!(summary.failed_sessions, 2);
        assert_eq!(summary.failed_session_reasons["GroundFailure"], 2);
        assert_eq!(summary.failed_session_reasons["OtherError:EmergencyStop"], 1);
        assert!(summary.successful_session_errors.is_empty());
    }

    #[test]
    fn serializes_with_report_labels() {
        let json = serde_json::to_value(summarize(&[], &[])).unwrap();

        assert_eq!(json["Total Sessions"], 0);
        assert_eq!(json["Peak Power (kW)"], 0.0);
        assert!(json["Failed Session Reasons"].as_object().unwrap().is_empty());
    }
}
