//! Tolerant decoding of embedded payload cells.

use serde_json::{Map, Value};

/// OCPP-J message type id of a CALL frame: `[2, id, action, payload]`.
const CALL_FRAME: u64 = 2;
/// OCPP-J message type id of a CALLRESULT frame: `[3, id, payload]`.
const CALL_RESULT_FRAME: u64 = 3;

/// Decodes a payload cell into a field map.
///
/// Accepts strict JSON, Python-style dict literals (single quotes, `None`,
/// `True`, `False`), double-encoded JSON strings, and OCPP-J frames. Returns
/// `None` when nothing usable can be recovered.
pub fn decode_payload(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value = serde_json::from_str::<Value>(trimmed)
        .or_else(|_| serde_json::from_str::<Value>(&python_literal_to_json(trimmed)))
        .ok()?;
    payload_object(value)
}

/// Extracts the payload object from an already-decoded cell.
pub fn payload_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::String(inner) => decode_payload(&inner),
        Value::Array(mut frame) => {
            let index = match frame.first().and_then(Value::as_u64) {
                Some(CALL_FRAME) => 3,
                Some(CALL_RESULT_FRAME) => 2,
                _ => return None,
            };
            if index < frame.len() {
                match frame.swap_remove(index) {
                    Value::Object(map) => Some(map),
                    _ => None,
                }
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Rewrites a Python literal into JSON text.
fn python_literal_to_json(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(open) = quote {
            match c {
                '\\' => match chars.next() {
                    Some('\'') => out.push('\''),
                    Some(escaped) => {
                        out.push('\\');
                        out.push(escaped);
                    }
                    None => out.push('\\'),
                },
                _ if c == open => {
                    out.push('"');
                    quote = None;
                }
                '"' => out.push_str("\\\""),
                _ => out.push(c),
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push('"');
            }
            _ if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let mapped = match word.as_str() {
                    "None" => "null",
                    "True" => "true",
                    "False" => "false",
                    other => other,
                };
                out.push_str(mapped);
            }
            _ => out.push(c),
        }
    }

    out
}
