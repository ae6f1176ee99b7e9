//! Canonical error taxonomy for status notifications.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OCPP `errorCode` reported when nothing is wrong.
pub const NO_ERROR: &str = "NoError";

const FAULTED: &str = "Faulted";

/// OCPP error codes treated as hard faults when seen outside a session.
const FAULT_CODES: &[&str] = &[
    "ConnectorLockFailure",
    "EVCommunicationError",
    "GroundFailure",
    "HighTemperature",
    "InternalError",
    "OverCurrentFailure",
    "OverVoltage",
    "PowerMeterFailure",
    "PowerSwitchFailure",
    "ReaderFailure",
    "ResetFailure",
    "UnderVoltage",
];

/// A canonical error code, optionally refined by a vendor sub-error.
///
/// Bucketing uses [`ErrorCode::canonical`]: `main` alone, or `main:sub` for
/// compound codes. A compound code never equals its bare main error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ErrorCode {
    pub main: String,
    pub sub: Option<String>,
}

impl ErrorCode {
    #[must_use]
    pub fn bare(main: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            sub: None,
        }
    }

    #[must_use]
    pub fn compound(main: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            sub: Some(sub.into()),
        }
    }

    /// Bucketing key: `main` or `main:sub`.
    #[must_use]
    pub fn canonical(&self) -> String {
        match &self.sub {
            Some(sub) => format!("{}:{sub}", self.main),
            None => self.main.clone(),
        }
    }

    /// Parses a bucketing key produced by [`ErrorCode::canonical`].
    #[must_use]
    pub fn parse_canonical(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(split_compound(raw).unwrap_or_else(|| Self::bare(raw)))
    }

    /// Human label, e.g. `OtherError (Emergency Stop Pressed)`.
    #[must_use]
    pub fn display_label(&self) -> String {
        match &self.sub {
            Some(sub) => format!("{} ({})", self.main, spaced_words(sub)),
            None => self.main.clone(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_canonical(s).ok_or_else(|| "empty error code".to_string())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Maps a status notification's `errorCode` and `info` to a canonical code.
///
/// Returns `None` when no error is reported.
pub fn classify(error_code: Option<&str>, info: Option<&str>) -> Option<ErrorCode> {
    let main = error_code.map(str::trim).filter(|code| !code.is_empty())?;
    if main == NO_ERROR {
        return None;
    }

    let compound = info.map(str::trim).and_then(split_compound);
    Some(compound.unwrap_or_else(|| ErrorCode::bare(main)))
}

/// Maps an event seen outside any session to a canonical code and category.
///
/// Wider than [`classify`]: a compound `info`, a `vendorErrorCode` or a
/// `Faulted` status count as errors even when `errorCode` is `NoError`.
pub fn classify_idle(
    status: Option<&str>,
    error_code: Option<&str>,
    info: Option<&str>,
    vendor_error_code: Option<&str>,
) -> Option<(ErrorCode, ErrorCategory)> {
    let faulted = status.is_some_and(|status| status.trim().eq_ignore_ascii_case(FAULTED));
    let code = classify(error_code, info)
        .or_else(|| info.map(str::trim).and_then(split_compound))
        .or_else(|| reported(vendor_error_code).map(ErrorCode::bare))
        .or_else(|| faulted.then(|| ErrorCode::bare(FAULTED)))?;

    let category = if faulted {
        ErrorCategory::Fault
    } else {
        ErrorCategory::of(reported(error_code).unwrap_or(code.main.as_str()))
    };
    Some((code, category))
}

fn reported(code: Option<&str>) -> Option<&str> {
    code.map(str::trim)
        .filter(|code| !code.is_empty() && *code != NO_ERROR)
}

fn split_compound(raw: &str) -> Option<ErrorCode> {
    let (main, sub) = raw.split_once(':')?;
    let (main, sub) = (main.trim(), sub.trim());
    if main.is_empty() || sub.is_empty() || main.contains(char::is_whitespace) {
        return None;
    }
    Some(ErrorCode::compound(main, sub))
}

/// Splits `EmergencyStopPressed` or `emergency_stop` into spaced words.
fn spaced_words(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    let mut prev: Option<char> = None;

    for c in raw.chars() {
        if c == '_' || c == '-' {
            if !out.ends_with(' ') && !out.is_empty() {
                out.push(' ');
            }
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            let boundary = (c.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()))
                || (c.is_ascii_digit() && p.is_alphabetic());
            if boundary && !out.ends_with(' ') {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }

    out.trim_end().to_string()
}

/// Severity bucket for idle-time errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Fault,
    Warning,
}

impl ErrorCategory {
    /// Categorizes a raw OCPP `errorCode`. Unknown codes are warnings.
    #[must_use]
    pub fn of(error_code: &str) -> Self {
        if FAULT_CODES.contains(&error_code.trim()) {
            Self::Fault
        } else {
            Self::Warning
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fault => "Fault",
            Self::Warning => "Warning",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_error_and_missing_codes_are_not_errors() {
        assert_eq!(classify(Some("NoError"), None), None);
        assert_eq!(classify(Some("NoError"), Some("Main:Sub")), None);
        assert_eq!(classify(None, Some("Main:Sub")), None);
        assert_eq!(classify(Some("  "), None), None);
    }

    #[test]
    fn bare_code_uses_error_code() {
        let code = classify(Some("GroundFailure"), Some("relay stuck")).unwrap();
        assert_eq!(code, ErrorCode::bare("GroundFailure"));
        assert_eq!(code.canonical(), "GroundFailure");
        assert_eq!(code.display_label(), "GroundFailure");
    }

    #[test]
    fn compound_info_is_preserved() {
        let code = classify(Some("OtherError"), Some("OtherError:EmergencyStopPressed")).unwrap();

        assert_eq!(code.main, "OtherError");
        assert_eq!(code.sub.as_deref(), Some("EmergencyStopPressed"));
        assert_eq!(code.canonical(), "OtherError:EmergencyStopPressed");
        assert_eq!(code.display_label(), "OtherError (Emergency Stop Pressed)");
        assert_ne!(code, ErrorCode::bare("OtherError"));
    }

    #[test]
    fn display_label_splits_underscores() {
        let code = ErrorCode::compound("OtherError", "gfci_trip");
        assert_eq!(code.display_label(), "OtherError (gfci trip)");
    }

    #[test]
    fn canonical_string_roundtrips_through_serde() {
        let code = ErrorCode::compound("InternalError", "PowerModuleFault");
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"InternalError:PowerModuleFault\"");

        let parsed: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, code);
    }

    #[test]
    fn idle_classification_widens_beyond_error_code() {
        assert_eq!(
            classify_idle(Some("Faulted"), Some("NoError"), None, None),
            Some((ErrorCode::bare("Faulted"), ErrorCategory::Fault))
        );
        assert_eq!(
            classify_idle(Some("Available"), Some("NoError"), None, Some("E42")),
            Some((ErrorCode::bare("E42"), ErrorCategory::Warning))
        );
        assert_eq!(
            classify_idle(Some("Available"), Some("NoError"), Some("Relay:Welded"), Some("E42")),
            Some((ErrorCode::compound("Relay", "Welded"), ErrorCategory::Warning))
        );
        assert_eq!(
            classify_idle(Some("Unavailable"), Some("InternalError"), None, None),
            Some((ErrorCode::bare("InternalError"), ErrorCategory::Fault))
        );
    }

    #[test]
    fn idle_classification_ignores_quiet_statuses() {
        assert_eq!(classify_idle(Some("Available"), Some("NoError"), None, None), None);
        assert_eq!(classify_idle(None, None, Some("plain note"), Some("  ")), None);
        assert_eq!(classify_idle(Some("Preparing"), None, None, Some("NoError")), None);
    }

    #[test]
    fn fault_table_drives_category() {
        assert_eq!(ErrorCategory::of("GroundFailure"), ErrorCategory::Fault);
        assert_eq!(ErrorCategory::of("OverVoltage"), ErrorCategory::Fault);
        assert_eq!(ErrorCategory::of("OtherError"), ErrorCategory::Warning);
        assert_eq!(ErrorCategory::of("SomethingNew"), ErrorCategory::Warning);
    }
}
