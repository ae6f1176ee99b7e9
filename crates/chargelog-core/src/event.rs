//! Normalized OCPP events and typed payload access.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Measurand carrying instantaneous active power.
pub const MEASURAND_POWER: &str = "Power.Active.Import";
/// Measurand carrying voltage.
pub const MEASURAND_VOLTAGE: &str = "Voltage";
/// Measurand carrying imported current.
pub const MEASURAND_CURRENT: &str = "Current.Import";
/// OCPP default when a sampled value omits `measurand`.
const DEFAULT_MEASURAND: &str = "Energy.Active.Import.Register";

/// OCPP message kinds relevant to session reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    StartTransaction,
    StopTransaction,
    MeterValues,
    StatusNotification,
    /// Any other message (heartbeats, boot notifications, responses).
    Other(String),
}

impl Command {
    /// Parses a command cell.
    ///
    /// Accepts both the log's `...Request` names and bare OCPP-J action names.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_ascii_lowercase();
        match lowered.strip_suffix("request").unwrap_or(&lowered) {
            "starttransaction" => Self::StartTransaction,
            "stoptransaction" => Self::StopTransaction,
            "metervalues" => Self::MeterValues,
            "statusnotification" => Self::StatusNotification,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::StartTransaction => "StartTransactionRequest",
            Self::StopTransaction => "StopTransactionRequest",
            Self::MeterValues => "MeterValuesRequest",
            Self::StatusNotification => "StatusNotificationRequest",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical connector identifier.
///
/// `0` is the charger-wide sentinel used by OCPP for the charge point itself
/// and for rows whose connector cannot be determined.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnectorId(pub u32);

impl ConnectorId {
    pub const CHARGER: Self = Self(0);

    #[must_use]
    pub const fn is_charger_wide(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded protocol payload.
///
/// Every accessor returns `None` for absent, `null`, or mistyped fields so
/// callers never have to guess at the payload shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the raw value, treating `null` as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    /// Returns a non-blank string field.
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns a string or numeric field rendered as text.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    /// Returns a numeric field, accepting numeric strings.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(value_to_f64)
    }

    /// Returns an integral field, accepting numeric strings.
    #[must_use]
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Flattens `meterValue[].sampledValue[]` into numeric samples.
    ///
    /// Samples whose value is not numeric are dropped.
    #[must_use]
    pub fn meter_samples(&self) -> Vec<MeterSample> {
        let Some(Value::Array(meter_values)) = self.get("meterValue") else {
            return Vec::new();
        };

        meter_values
            .iter()
            .filter_map(|meter_value| meter_value.get("sampledValue")?.as_array())
            .flatten()
            .filter_map(|sampled| {
                let value = sampled.get("value").and_then(value_to_f64)?;
                let measurand = sampled
                    .get("measurand")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_MEASURAND)
                    .to_string();
                let unit = sampled
                    .get("unit")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some(MeterSample {
                    measurand,
                    value,
                    unit,
                })
            })
            .collect()
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

/// One sampled value from a `MeterValues` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterSample {
    pub measurand: String,
    pub value: f64,
    pub unit: Option<String>,
}

impl MeterSample {
    /// Power in kW. Readings are watts unless the sample declares `kW`.
    #[must_use]
    pub fn kilowatts(&self) -> f64 {
        match self.unit.as_deref() {
            Some(unit) if unit.eq_ignore_ascii_case("kW") => self.value,
            _ => self.value / 1000.0,
        }
    }
}

/// A single normalized log row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Zero-based index of the source row.
    pub row: usize,
    pub command: Command,
    pub timestamp: NaiveDateTime,
    pub connector: ConnectorId,
    pub payload: Payload,
}
