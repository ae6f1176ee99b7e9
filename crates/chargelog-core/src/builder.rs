//! Per-connector transaction state machine.
//!
//! A connector is either idle or has one open session. Events must be pushed
//! in chronological order:
//! - `StartTransaction` opens a session, force-closing any open one first.
//! - `MeterValues` and `StatusNotification` enrich the open session.
//! - `StopTransaction` closes the open session. Statuses logged at the
//!   stop's exact instant still count towards it.
//! - While idle, error-bearing events become [`IdleTimeError`]s and
//!   everything else is dropped.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::error_code::{ErrorCode, classify, classify_idle};
use crate::event::{
    Command, ConnectorId, MEASURAND_CURRENT, MEASURAND_POWER, MEASURAND_VOLTAGE, Payload, RawEvent,
};
use crate::idle::{IdleTimeError, dedup_idle_errors};
use crate::session::{ChargingSession, CloseReason, Outcome};

/// Everything reconstructed for one connector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorSessions {
    pub connector: ConnectorId,
    pub sessions: Vec<ChargingSession>,
    /// Deduplicated, in chronological order.
    pub idle_errors: Vec<IdleTimeError>,
}

/// Builds sessions for one connector from its chronological events.
pub fn build_sessions(connector: ConnectorId, events: &[RawEvent]) -> ConnectorSessions {
    let mut builder = SessionBuilder::new(connector);
    for event in events {
        builder.push(event);
    }
    builder.finish()
}

#[derive(Debug, Default, Clone, Copy)]
struct RunningMean {
    sum: f64,
    count: u32,
}

impl RunningMean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

#[derive(Debug)]
struct OpenSession {
    start_time: NaiveDateTime,
    meter_start: Option<f64>,
    transaction_id: Option<String>,
    id_tag: Option<String>,
    errors: BTreeSet<ErrorCode>,
    had_charging: bool,
    max_power_kw: Option<f64>,
    voltage: RunningMean,
    current: RunningMean,
}

impl OpenSession {
    fn start(event: &RawEvent) -> Self {
        Self {
            start_time: event.timestamp,
            meter_start: event.payload.number("meterStart"),
            transaction_id: event.payload.text("transactionId"),
            id_tag: event.payload.text("idTag"),
            errors: BTreeSet::new(),
            had_charging: false,
            max_power_kw: None,
            voltage: RunningMean::default(),
            current: RunningMean::default(),
        }
    }

    fn learn_transaction(&mut self, payload: &Payload) {
        if self.transaction_id.is_none() {
            self.transaction_id = payload.text("transactionId");
        }
    }

    fn record_meter_values(&mut self, payload: &Payload) {
        self.learn_transaction(payload);
        for sample in payload.meter_samples() {
            match sample.measurand.as_str() {
                MEASURAND_POWER => {
                    let kw = sample.kilowatts();
                    if self.max_power_kw.is_none_or(|peak| kw > peak) {
                        self.max_power_kw = Some(kw);
                    }
                }
                MEASURAND_VOLTAGE => self.voltage.push(sample.value),
                MEASURAND_CURRENT => self.current.push(sample.value),
                _ => {}
            }
        }
    }

    fn record_status(&mut self, payload: &Payload) {
        if let Some(code) = classify(payload.str("errorCode"), payload.str("info")) {
            self.errors.insert(code);
        }
        if payload
            .str("status")
            .is_some_and(|status| status.eq_ignore_ascii_case("Charging"))
        {
            self.had_charging = true;
        }
    }
}

#[derive(Debug)]
struct StopData<'a> {
    time: NaiveDateTime,
    payload: &'a Payload,
}

/// Incremental session reconstruction for a single connector.
///
/// Status notifications stamped with the same instant as a start or stop
/// belong to that session whichever side of it they were logged on. A stop
/// is held until a later instant (or a non-status event) arrives, and idle
/// events are held until the clock moves past them.
#[derive(Debug)]
pub struct SessionBuilder<'a> {
    connector: ConnectorId,
    open: Option<OpenSession>,
    closing: Option<(OpenSession, StopData<'a>)>,
    held_idle: Vec<&'a RawEvent>,
    sessions: Vec<ChargingSession>,
    idle_errors: Vec<IdleTimeError>,
}

impl<'a> SessionBuilder<'a> {
    #[must_use]
    pub const fn new(connector: ConnectorId) -> Self {
        Self {
            connector,
            open: None,
            closing: None,
            held_idle: Vec::new(),
            sessions: Vec::new(),
            idle_errors: Vec::new(),
        }
    }

    /// Feeds the next event in chronological order.
    pub fn push(&mut self, event: &'a RawEvent) {
        if let Some((open, stop)) = self.closing.as_mut() {
            if event.command == Command::StatusNotification && event.timestamp == stop.time {
                open.record_status(&event.payload);
                return;
            }
            self.settle_stop();
        }
        if self
            .held_idle
            .first()
            .is_some_and(|held| held.timestamp != event.timestamp)
        {
            self.release_idle();
        }

        if event.command == Command::StartTransaction {
            if let Some(open) = self.open.take() {
                tracing::debug!(
                    connector = %self.connector,
                    row = event.row,
                    "start while a session is open; closing the previous session"
                );
                self.close(open, None, CloseReason::NewStart);
            }
            let mut open = OpenSession::start(event);
            // everything still held shares this start's instant
            for held in std::mem::take(&mut self.held_idle) {
                if held.command == Command::StatusNotification {
                    open.record_status(&held.payload);
                } else {
                    self.record_idle(held);
                }
            }
            self.open = Some(open);
            return;
        }

        let Some(open) = self.open.as_mut() else {
            self.held_idle.push(event);
            return;
        };

        match event.command {
            Command::StopTransaction => {
                let stop_transaction = event.payload.text("transactionId");
                if let (Some(open_id), Some(stop_id)) = (&open.transaction_id, &stop_transaction) {
                    if open_id != stop_id {
                        tracing::debug!(
                            connector = %self.connector,
                            row = event.row,
                            open_transaction = %open_id,
                            stop_transaction = %stop_id,
                            "ignoring stop for a different transaction"
                        );
                        return;
                    }
                }
                if let Some(open) = self.open.take() {
                    let stop = StopData {
                        time: event.timestamp,
                        payload: &event.payload,
                    };
                    self.closing = Some((open, stop));
                }
            }
            Command::MeterValues => open.record_meter_values(&event.payload),
            Command::StatusNotification => open.record_status(&event.payload),
            Command::StartTransaction | Command::Other(_) => {}
        }
    }

    /// Closes any open session and returns everything built.
    pub fn finish(mut self) -> ConnectorSessions {
        self.settle_stop();
        if let Some(open) = self.open.take() {
            self.close(open, None, CloseReason::EndOfStream);
        }
        self.release_idle();
        ConnectorSessions {
            connector: self.connector,
            sessions: self.sessions,
            idle_errors: dedup_idle_errors(self.idle_errors),
        }
    }

    fn settle_stop(&mut self) {
        if let Some((open, stop)) = self.closing.take() {
            self.close(open, Some(stop), CloseReason::StopTransaction);
        }
    }

    fn release_idle(&mut self) {
        for held in std::mem::take(&mut self.held_idle) {
            self.record_idle(held);
        }
    }

    fn record_idle(&mut self, event: &RawEvent) {
        let payload = &event.payload;
        let vendor_error_code = payload.text("vendorErrorCode");
        let Some((error_code, category)) = classify_idle(
            payload.str("status"),
            payload.str("errorCode"),
            payload.str("info"),
            vendor_error_code.as_deref(),
        ) else {
            tracing::debug!(
                connector = %self.connector,
                row = event.row,
                command = %event.command,
                "ignoring event outside a session"
            );
            return;
        };

        self.idle_errors.push(IdleTimeError {
            timestamp: event.timestamp,
            command: event.command.to_string(),
            status: payload.text("status"),
            category,
            error_code,
            info: payload.text("info"),
            vendor_error_code,
            connector_id: event.connector,
        });
    }

    fn close(&mut self, mut open: OpenSession, stop: Option<StopData<'_>>, closed_by: CloseReason) {
        let stop_time = stop.as_ref().map(|stop| stop.time);
        let meter_stop = stop
            .as_ref()
            .and_then(|stop| stop.payload.number("meterStop"));
        let stop_reason = stop.as_ref().and_then(|stop| stop.payload.text("reason"));
        if let Some(stop) = &stop {
            open.learn_transaction(stop.payload);
        }

        let energy_kwh = match (open.meter_start, meter_stop) {
            (Some(start), Some(stop)) => {
                let energy = (stop - start) / 1000.0;
                if energy < 0.0 {
                    tracing::warn!(
                        connector = %self.connector,
                        meter_start = start,
                        meter_stop = stop,
                        "meter went backwards; clamping session energy to zero"
                    );
                    Some(0.0)
                } else {
                    Some(energy)
                }
            }
            _ => None,
        };

        let duration_minutes = stop_time.map(|stop| minutes_between(open.start_time, stop));
        let avg_power_kw = match (energy_kwh, duration_minutes) {
            (Some(energy), Some(minutes)) if minutes > 0.0 => Some(energy / (minutes / 60.0)),
            _ => None,
        };

        let outcome = Outcome::classify(!open.errors.is_empty(), open.had_charging, duration_minutes);
        let precharging_failure =
            outcome == Outcome::Incomplete && !open.had_charging && open.errors.is_empty();

        self.sessions.push(ChargingSession {
            connector_id: self.connector,
            transaction_id: open.transaction_id,
            id_tag: open.id_tag,
            start_time: open.start_time,
            stop_time,
            meter_start: open.meter_start,
            meter_stop,
            energy_kwh,
            duration_minutes,
            avg_power_kw,
            max_power_kw: open.max_power_kw,
            avg_voltage_v: open.voltage.mean(),
            avg_current_a: open.current.mean(),
            stop_reason,
            errors: open.errors,
            had_charging: open.had_charging,
            outcome,
            precharging_failure,
            closed_by,
        });
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "session lengths are far below f64 integer precision"
)]
fn minutes_between(start: NaiveDateTime, stop: NaiveDateTime) -> f64 {
    (stop - start).num_milliseconds() as f64 / 60_000.0
}
