//! Faults and warnings reported while no session is open.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error_code::{ErrorCategory, ErrorCode};
use crate::event::ConnectorId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleTimeError {
    pub timestamp: NaiveDateTime,
    /// Command of the row that reported the error.
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub error_code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_error_code: Option<String>,
    /// Connector as written in the log; `0` for charger-wide reports.
    pub connector_id: ConnectorId,
    pub category: ErrorCategory,
}

/// Drops repeats of the same error at the same instant on the same
/// connector, keeping the first occurrence in input order.
pub fn dedup_idle_errors(errors: Vec<IdleTimeError>) -> Vec<IdleTimeError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|error| {
            seen.insert((
                error.timestamp,
                error.error_code.canonical(),
                error.connector_id,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    fn idle(minute: u32, code: ErrorCode, connector: u32, status: &str) -> IdleTimeError {
        IdleTimeError {
            timestamp: NaiveDate::from_ymd_opt(2024, 12, 10)
                .unwrap()
                .and_hms_opt(9, minute, 0)
                .unwrap(),
            command: "StatusNotificationRequest".to_string(),
            status: Some(status.to_string()),
            error_code: code,
            info: None,
            vendor_error_code: None,
            connector_id: ConnectorId(connector),
            category: ErrorCategory::Warning,
        }
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let errors = vec![
            idle(0, ErrorCode::bare("OtherError"), 1, "Faulted"),
            idle(0, ErrorCode::bare("OtherError"), 1, "Unavailable"),
            idle(0, ErrorCode::bare("OtherError"), 2, "Faulted"),
            idle(1, ErrorCode::bare("OtherError"), 1, "Faulted"),
            idle(0, ErrorCode::compound("OtherError", "Tamper"), 1, "Faulted"),
        ];

        let deduped = dedup_idle_errors(errors);

        assert_eq!(deduped.len(), 4);
        assert_eq!(deduped[0].status.as_deref(), Some("Faulted"));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(idle(5, ErrorCode::bare("GroundFailure"), 0, "Faulted"))
            .unwrap();

        assert_eq!(json["errorCode"], "GroundFailure");
        assert_eq!(json["connectorId"], 0);
        assert_eq!(json["category"], "Warning");
        assert!(json.get("info").is_none());
    }
}
