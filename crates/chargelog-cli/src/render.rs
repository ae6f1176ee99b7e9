//! Human-readable rendering of processing results.

use std::collections::BTreeMap;
use std::fmt::Write;

use chargelog_core::{ChargingSession, ConnectorView, ErrorCode, IdleTimeError, ProcessedLog};
use chargelog_db::UploadRecord;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders a processed log as a per-connector report.
pub fn format_processed(result: &ProcessedLog) -> String {
    let mut output = String::new();
    let diagnostics = &result.diagnostics;

    let _ = writeln!(
        output,
        "Rows: {} total, {} skipped, {} unrouted",
        diagnostics.rows_total, diagnostics.rows_skipped, diagnostics.unrouted_events
    );
    if diagnostics.connectors_resolved_by_transaction > 0 {
        let _ = writeln!(
            output,
            "Connectors recovered from transaction ids: {}",
            diagnostics.connectors_resolved_by_transaction
        );
    }

    for view in result.connectors() {
        output.push('\n');
        write_connector(&mut output, &view);
    }

    output
}

fn write_connector(output: &mut String, view: &ConnectorView<'_>) {
    let summary = view.summary;
    let _ = writeln!(output, "Connector {}", view.connector);
    let _ = writeln!(
        output,
        "  Sessions: {} ({} successful, {} failed, {} incomplete, {} interrupted)",
        summary.total_sessions,
        summary.successful_sessions,
        summary.failed_sessions,
        summary.incomplete_sessions,
        summary.interrupted_sessions
    );
    let _ = writeln!(
        output,
        "  Precharging failures: {}",
        summary.precharging_failures
    );
    let _ = writeln!(
        output,
        "  Energy: {:.2} kWh (avg {:.2} kWh/session)",
        summary.total_energy_kwh, summary.average_energy_kwh
    );
    let _ = writeln!(
        output,
        "  Duration: {:.2} h (avg {:.1} min)",
        summary.total_duration_hours, summary.average_duration_minutes
    );
    let _ = writeln!(
        output,
        "  Power: avg {:.2} kW, peak {:.2} kW",
        summary.average_power_kw, summary.peak_power_kw
    );

    write_histogram(output, "Failed session reasons", &summary.failed_session_reasons);
    write_histogram(
        output,
        "Successful session errors",
        &summary.successful_session_errors,
    );

    if !view.sessions.is_empty() {
        let _ = writeln!(output, "  Session log:");
        for session in view.sessions {
            let _ = writeln!(output, "    {}", session_line(session));
        }
    }

    let _ = writeln!(output, "  Idle time errors: {}", summary.idle_time_error_count);
    for error in view.idle_errors {
        let _ = writeln!(output, "    {}", idle_line(error));
    }
}

fn write_histogram(output: &mut String, title: &str, histogram: &BTreeMap<String, usize>) {
    if histogram.is_empty() {
        return;
    }
    let _ = writeln!(output, "  {title}:");
    for (code, count) in histogram {
        let _ = writeln!(output, "    {}: {count}", label(code));
    }
}

fn label(canonical: &str) -> String {
    ErrorCode::parse_canonical(canonical)
        .map_or_else(|| canonical.to_string(), |code| code.display_label())
}

fn session_line(session: &ChargingSession) -> String {
    let duration = session
        .duration_minutes
        .map_or_else(|| "-".to_string(), |minutes| format!("{minutes:.1} min"));
    let energy = session
        .energy_kwh
        .map_or_else(|| "-".to_string(), |energy| format!("{energy:.2} kWh"));

    let mut line = format!(
        "{} | {duration} | {energy} | {}",
        session.start_time.format(TIME_FORMAT),
        session.outcome
    );
    if !session.errors.is_empty() {
        let labels: Vec<String> = session.errors.iter().map(ErrorCode::display_label).collect();
        let _ = write!(line, " | {}", labels.join(", "));
    }
    line
}

fn idle_line(error: &IdleTimeError) -> String {
    format!(
        "{} | {} | {} | {}",
        error.timestamp.format(TIME_FORMAT),
        error.category,
        error.error_code.display_label(),
        error.status.as_deref().unwrap_or("-")
    )
}

/// Renders stored uploads, one per line.
pub fn format_uploads(uploads: &[UploadRecord]) -> String {
    if uploads.is_empty() {
        return "No uploads stored.\n".to_string();
    }

    let mut output = String::new();
    for upload in uploads {
        let _ = writeln!(
            output,
            "{}  {}  {}  {} ({})",
            upload.id,
            upload.uploaded_at.format("%Y-%m-%d %H:%M"),
            upload.owner,
            upload.filename,
            upload.data_source
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    use chargelog_core::{ProcessOptions, RawRow, process_log};
    use insta::assert_snapshot;
    use serde_json::json;

    fn sample_rows() -> Vec<RawRow> {
        serde_json::from_value(json!([
            {
                "command": "StartTransactionRequest",
                "real_time": "10/12/2024 10:00:00",
                "connectorId": 1,
                "payLoadData": "{'connectorId': 1, 'meterStart': 1000000}"
            },
            {
                "command": "StatusNotificationRequest",
                "real_time": "10/12/2024 10:05:00",
                "connectorId": 1,
                "payLoadData": "{'connectorId': 1, 'status': 'Charging', 'errorCode': 'NoError'}"
            },
            {
                "command": "StopTransactionRequest",
                "real_time": "10/12/2024 10:30:00",
                "connectorId": 1,
                "payLoadData": "{'meterStop': 1025000}"
            },
            {
                "command": "StartTransactionRequest",
                "real_time": "10/12/2024 11:00:00",
                "connectorId": 2,
                "payLoadData": "{'connectorId': 2, 'meterStart': 0}"
            },
            {
                "command": "StatusNotificationRequest",
                "real_time": "10/12/2024 11:02:00",
                "connectorId": 2,
                "payLoadData": "{'status': 'Faulted', 'errorCode': 'OtherError', 'info': 'OtherError:EmergencyStop'}"
            },
            {
                "command": "StopTransactionRequest",
                "real_time": "10/12/2024 11:10:00",
                "connectorId": 2,
                "payLoadData": "{'meterStop': 100}"
            },
            {
                "command": "StatusNotificationRequest",
                "real_time": "10/12/2024 12:00:00",
                "connectorId": 2,
                "payLoadData": "{'status': 'Faulted', 'errorCode': 'GroundFailure'}"
            },
            {"command": "Heartbeat", "real_time": "garbage"}
        ]))
        .unwrap()
    }

    #[test]
    fn processed_report_lists_both_connectors() {
        let result = process_log(&sample_rows(), ProcessOptions::default());

        assert_snapshot!(format_processed(&result), @r"
        Rows: 8 total, 1 skipped, 0 unrouted

        Connector 1
          Sessions: 1 (1 successful, 0 failed, 0 incomplete, 0 interrupted)
          Precharging failures: 0
          Energy: 25.00 kWh (avg 25.00 kWh/session)
          Duration: 0.50 h (avg 30.0 min)
          Power: avg 50.00 kW, peak 0.00 kW
          Session log:
            2024-12-10 10:00:00 | 30.0 min | 25.00 kWh | Successful
          Idle time errors: 0

        Connector 2
          Sessions: 1 (0 successful, 1 failed, 0 incomplete, 0 interrupted)
          Precharging failures: 0
          Energy: 0.10 kWh (avg 0.10 kWh/session)
          Duration: 0.17 h (avg 10.0 min)
          Power: avg 0.60 kW, peak 0.00 kW
          Failed session reasons:
            OtherError (Emergency Stop): 1
          Session log:
            2024-12-10 11:00:00 | 10.0 min | 0.10 kWh | Failed | OtherError (Emergency Stop)
          Idle time errors: 1
            2024-12-10 12:00:00 | Fault | GroundFailure | Faulted
        ");
    }

    #[test]
    fn empty_upload_list() {
        assert_snapshot!(format_uploads(&[]), @"No uploads stored.");
    }
}
