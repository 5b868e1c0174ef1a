// src/pack.rs
//
// JSON object <-> 8-byte CAN payload, driven by an entry's field layout.
//
// Fields are written back to back in table order; unused trailing bytes
// are zero. Multi-byte integers are big-endian.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::table::{Entry, FieldKind, FieldSpec, PAYLOAD_LEN};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("field {field}: expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("field {field}: value {value} out of range {min}..={max}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("field {0}: invalid colour (expected #RRGGBB)")]
    InvalidColour(String),
    #[error("field {field}: unknown enum value '{value}'")]
    UnknownEnumValue { field: String, value: String },
    #[error("layout for {topic} needs {needed} bytes, frame holds 8")]
    Overflow { topic: String, needed: usize },
}

// ============================================================================
// Helpers
// ============================================================================

pub fn clamp<T: PartialOrd>(v: T, lo: T, hi: T) -> T {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// "#RRGGBB" -> [r, g, b]. Exactly six hex digits after the '#'.
pub fn parse_hex_rgb(s: &str) -> Option<[u8; 3]> {
    let digits = s.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let mut rgb = [0u8; 3];
    hex::decode_to_slice(digits, &mut rgb).ok()?;
    Some(rgb)
}

/// [r, g, b] -> "#RRGGBB" (uppercase)
pub fn format_hex_rgb(rgb: [u8; 3]) -> String {
    format!("#{}", hex::encode_upper(rgb))
}

pub fn enum_str_to_code(field: &FieldSpec, key: &str) -> Option<u8> {
    if field.kind != FieldKind::Enum {
        return None;
    }
    field
        .choices
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, code)| *code)
}

pub fn enum_code_to_str(field: &FieldSpec, code: u8) -> Option<&str> {
    if field.kind != FieldKind::Enum {
        return None;
    }
    field
        .choices
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(k, _)| k.as_str())
}

fn wrong_type(field: &FieldSpec, expected: &'static str) -> PackError {
    PackError::WrongType {
        field: field.name.clone(),
        expected,
    }
}

/// JSON number truncated toward zero, then range-checked
fn integer_in_range(field: &FieldSpec, value: &Value, min: i64, max: i64) -> Result<i64, PackError> {
    let n = value.as_f64().ok_or_else(|| wrong_type(field, "a number"))?;
    let v = n.trunc() as i64;
    if v < min || v > max {
        return Err(PackError::OutOfRange {
            field: field.name.clone(),
            value: v,
            min,
            max,
        });
    }
    Ok(v)
}

fn check_layout(entry: &Entry) -> Result<(), PackError> {
    let needed = entry.payload_len();
    if needed > PAYLOAD_LEN {
        return Err(PackError::Overflow {
            topic: entry.topic.clone(),
            needed,
        });
    }
    Ok(())
}

// ============================================================================
// Pack / Unpack
// ============================================================================

/// Pack a JSON object into an 8-byte payload. Extra keys are ignored.
pub fn pack_payload(entry: &Entry, input: &Value) -> Result<[u8; PAYLOAD_LEN], PackError> {
    let obj = input.as_object().ok_or(PackError::NotAnObject)?;
    check_layout(entry)?;

    let mut out = [0u8; PAYLOAD_LEN];
    let mut idx = 0;

    for field in &entry.fields {
        let value = obj
            .get(&field.name)
            .ok_or_else(|| PackError::MissingField(field.name.clone()))?;

        match field.kind {
            FieldKind::U8 => {
                out[idx] = integer_in_range(field, value, 0, 255)? as u8;
            }
            FieldKind::Bool => {
                let b = value.as_bool().ok_or_else(|| wrong_type(field, "a boolean"))?;
                out[idx] = u8::from(b);
            }
            FieldKind::Rgb => {
                let s = value
                    .as_str()
                    .ok_or_else(|| wrong_type(field, "a \"#RRGGBB\" string"))?;
                let rgb =
                    parse_hex_rgb(s).ok_or_else(|| PackError::InvalidColour(field.name.clone()))?;
                out[idx..idx + 3].copy_from_slice(&rgb);
            }
            FieldKind::U16 => {
                let v = integer_in_range(field, value, 0, 65535)? as u16;
                out[idx..idx + 2].copy_from_slice(&v.to_be_bytes());
            }
            FieldKind::Enum => {
                let key = value
                    .as_str()
                    .ok_or_else(|| wrong_type(field, "an enum string"))?;
                out[idx] = enum_str_to_code(field, key).ok_or_else(|| {
                    PackError::UnknownEnumValue {
                        field: field.name.clone(),
                        value: key.to_string(),
                    }
                })?;
            }
        }
        idx += field.kind.width();
    }

    Ok(out)
}

/// Unpack an 8-byte payload into a JSON object in field order.
/// Enum codes missing from the dictionary come back as plain numbers.
pub fn unpack_payload(entry: &Entry, data: &[u8; PAYLOAD_LEN]) -> Result<Map<String, Value>, PackError> {
    check_layout(entry)?;

    let mut obj = Map::new();
    let mut idx = 0;

    for field in &entry.fields {
        let value = match field.kind {
            FieldKind::U8 => Value::from(data[idx]),
            FieldKind::Bool => Value::Bool(data[idx] != 0),
            FieldKind::Rgb => Value::String(format_hex_rgb([data[idx], data[idx + 1], data[idx + 2]])),
            FieldKind::U16 => Value::from(u16::from_be_bytes([data[idx], data[idx + 1]])),
            FieldKind::Enum => match enum_code_to_str(field, data[idx]) {
                Some(key) => Value::String(key.to_string()),
                None => Value::from(data[idx]),
            },
        };
        obj.insert(field.name.clone(), value);
        idx += field.kind.width();
    }

    Ok(obj)
}

// ============================================================================
// Tests
// ============================================================================
