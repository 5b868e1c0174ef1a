// src/table.rs
//
// MQTT topic <-> CAN ID conversion table.
//
// The table is a JSON document of any shape. Every object carrying a
// "topic", a "data" layout and an "arbitration_id" (or "id") is an entry:
//
// {
//   "led": {
//     "config": {
//       "topic": "led/config",
//       "arbitration_id": 1310,
//       "data": {
//         "group_id": "int",
//         "color": "hex",
//         "mode": { "OFF": 0, "ON": 1 }
//       }
//     }
//   }
// }
//
// "data" is either an object (name -> type, or name -> enum dictionary) or
// an array of { "name", "type", "dict" } objects. Field order is the
// byte order on the bus.

use serde_json::{Map, Value};
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Classic CAN payload size; every entry packs into exactly this many bytes
pub const PAYLOAD_LEN: usize = 8;

/// Largest 29-bit identifier
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Largest 11-bit identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

// ============================================================================
// Types
// ============================================================================

/// Wire encoding of a single field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// 1 byte, 0..=255
    U8,
    /// 1 byte, 0 or 1
    Bool,
    /// 3 bytes from "#RRGGBB"
    Rgb,
    /// 2 bytes big-endian, 0..=65535
    U16,
    /// 1 byte looked up in a string -> code dictionary
    Enum,
}

impl FieldKind {
    /// Parse a type name from the table. Returns None for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int" | "uint8" | "u8" | "byte" => Some(FieldKind::U8),
            "bool" | "boolean" => Some(FieldKind::Bool),
            "hex" | "rgb" => Some(FieldKind::Rgb),
            "int16" | "i16" | "u16" | "uint16" => Some(FieldKind::U16),
            "enum" | "dict" => Some(FieldKind::Enum),
            _ => None,
        }
    }

    /// Number of payload bytes this field occupies
    pub fn width(self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::Bool | FieldKind::Enum => 1,
            FieldKind::U16 => 2,
            FieldKind::Rgb => 3,
        }
    }
}

/// One field of an entry's payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Enum dictionary in table order (empty for non-enum fields)
    pub choices: Vec<(String, u8)>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            choices: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<(String, u8)>) -> Self {
        self.choices = choices;
        self
    }
}

/// A topic, its CAN ID and the payload layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub topic: String,
    pub can_id: u32,
    pub fields: Vec<FieldSpec>,
}

impl Entry {
    /// Bytes used by the layout (the rest of the 8-byte frame is padding)
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|f| f.kind.width()).sum()
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot read table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid table JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no (topic, id, data) mapping found in table")]
    Empty,
}

// ============================================================================
// Conversion Table
// ============================================================================

/// Loaded table with O(1) lookups by topic and by CAN ID
#[derive(Clone, Debug, Default)]
pub struct ConversionTable {
    entries: Vec<Entry>,
    by_topic: HashMap<String, usize>,
    by_id: HashMap<u32, usize>,
}

impl ConversionTable {
    /// Load the table from a JSON file.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let text = std::fs::read_to_string(path).map_err(|source| TableError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Build the table from JSON text. Fails when no entry is found.
    pub fn from_json_str(text: &str) -> Result<Self, TableError> {
        let root: Value = serde_json::from_str(text)?;

        let mut found = Vec::new();
        collect_entries(&root, &mut found);

        let mut table = Self::default();
        for entry in found {
            table.insert(entry);
        }

        if table.entries.is_empty() {
            return Err(TableError::Empty);
        }

        crate::tlog!(
            "Table loaded: {} topics, {} ids",
            table.by_topic.len(),
            table.by_id.len()
        );
        Ok(table)
    }

    fn insert(&mut self, entry: Entry) {
        if self.by_topic.contains_key(&entry.topic) {
            crate::tlog!(warn: "Duplicate topic '{}' ignored (id=0x{:X})", entry.topic, entry.can_id);
            return;
        }

        let idx = self.entries.len();
        match self.by_id.entry(entry.can_id) {
            MapEntry::Occupied(first) => {
                crate::tlog!(
                    warn: "CAN id 0x{:X} used by '{}' and '{}'; frames map to '{}'",
                    entry.can_id,
                    self.entries[*first.get()].topic,
                    entry.topic,
                    self.entries[*first.get()].topic
                );
            }
            MapEntry::Vacant(slot) => {
                slot.insert(idx);
            }
        }
        self.by_topic.insert(entry.topic.clone(), idx);
        self.entries.push(entry);
    }

    pub fn find_by_topic(&self, topic: &str) -> Option<&Entry> {
        self.by_topic.get(topic).map(|&i| &self.entries[i])
    }

    pub fn find_by_id(&self, can_id: u32) -> Option<&Entry> {
        self.by_id.get(&can_id).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Depth-first walk in document order
fn collect_entries(node: &Value, out: &mut Vec<Entry>) {
    match node {
        Value::Object(obj) => {
            if let Some(entry) = entry_from_object(obj) {
                out.push(entry);
            }
            for child in obj.values() {
                collect_entries(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_entries(item, out);
            }
        }
        _ => {}
    }
}

fn entry_from_object(obj: &Map<String, Value>) -> Option<Entry> {
    let topic = obj.get("topic")?.as_str()?;
    let data = obj.get("data")?;
    let id_node = obj.get("arbitration_id").or_else(|| obj.get("id"))?;

    let topic = topic.trim_end_matches('/');
    if topic.is_empty() {
        crate::tlog!(warn: "Entry with empty topic ignored");
        return None;
    }

    let Some(can_id) = parse_can_id(id_node) else {
        crate::tlog!(warn: "Invalid CAN id {} for {}", id_node, topic);
        return None;
    };
    if can_id > MAX_EXTENDED_ID {
        crate::tlog!(warn: "CAN id 0x{:X} for {} exceeds 29 bits", can_id, topic);
        return None;
    }

    let fields = match build_fields(data, topic) {
        Ok(fields) => fields,
        Err(reason) => {
            crate::tlog!(warn: "Invalid data for {}: {}", topic, reason);
            return None;
        }
    };

    let entry = Entry {
        topic: topic.to_string(),
        can_id,
        fields,
    };
    if entry.payload_len() > PAYLOAD_LEN {
        crate::tlog!(
            warn: "Layout for {} needs {} bytes (max {})",
            topic,
            entry.payload_len(),
            PAYLOAD_LEN
        );
        return None;
    }
    Some(entry)
}

/// CAN ID from a JSON integer, a "0x"-prefixed hex string or a decimal string
pub fn parse_can_id(node: &Value) -> Option<u32> {
    match node {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => s.parse::<u32>().ok(),
            }
        }
        _ => None,
    }
}

fn parse_kind(type_name: &str, field: &str, topic: &str) -> FieldKind {
    FieldKind::parse(type_name).unwrap_or_else(|| {
        crate::tlog!(warn: "Unknown type '{}' for {}.{}, using int", type_name, topic, field);
        FieldKind::U8
    })
}

fn build_fields(data: &Value, topic: &str) -> Result<Vec<FieldSpec>, String> {
    match data {
        // [ { "name": "...", "type": "...", "dict": {...} }, ... ]
        Value::Array(items) => {
            let mut fields = Vec::with_capacity(items.len());
            for item in items {
                let Some(obj) = item.as_object() else { continue };
                let (Some(name), Some(type_name)) = (
                    obj.get("name").and_then(Value::as_str),
                    obj.get("type").and_then(Value::as_str),
                ) else {
                    continue;
                };
                let kind = parse_kind(type_name, name, topic);
                let mut spec = FieldSpec::new(name, kind);
                if kind == FieldKind::Enum {
                    let dict = obj.get("dict").or_else(|| obj.get("enum"));
                    spec.choices = choices_from(dict);
                }
                fields.push(spec);
            }
            Ok(fields)
        }
        // { "name": "type", "mode": { "OFF": 0, "ON": 1 }, ... }
        Value::Object(map) => {
            let mut fields = Vec::with_capacity(map.len());
            for (name, value) in map {
                match value {
                    Value::String(type_name) => {
                        let kind = parse_kind(type_name, name, topic);
                        fields.push(FieldSpec::new(name.as_str(), kind));
                    }
                    Value::Object(dict) if !dict.is_empty() => {
                        fields.push(
                            FieldSpec::new(name.as_str(), FieldKind::Enum)
                                .with_choices(choices_from(Some(value))),
                        );
                    }
                    _ => {
                        crate::tlog!(warn: "Field {}.{} has no usable type, skipped", topic, name);
                    }
                }
            }
            Ok(fields)
        }
        _ => Err("expected an array or an object".to_string()),
    }
}

/// Enum dictionary; non-numeric codes are skipped, codes keep their low byte
fn choices_from(dict: Option<&Value>) -> Vec<(String, u8)> {
    let Some(Value::Object(map)) = dict else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, code)| {
            let code = code.as_f64()? as i64;
            Some((key.clone(), (code & 0xFF) as u8))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    #[test]
    fn test_table_load_ok() {
        let table = ConversionTable::load(&fixture("conv_ok.json")).unwrap();
        let led = table.find_by_topic("led/config").expect("led/config");
        assert_eq!(led.can_id, 0x51E);
        assert_eq!(table.find_by_id(0x51E).map(|e| e.topic.as_str()), Some("led/config"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_table_led_layout() {
        let table = ConversionTable::load(&fixture("conv_ok.json")).unwrap();
        let led = table.find_by_topic("led/config").unwrap();
        let names: Vec<_> = led.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["group_id", "intensity", "color", "mode", "interval"]);
        assert_eq!(led.fields[2].kind, FieldKind::Rgb);
        assert_eq!(led.fields[3].kind, FieldKind::Enum);
        assert_eq!(
            led.fields[3].choices,
            vec![("OFF".to_string(), 0), ("ON".to_string(), 1), ("BLINK".to_string(), 2)]
        );
        assert_eq!(led.payload_len(), 7);
    }

    #[test]
    fn test_table_object_form_and_hex_id() {
        let table = ConversionTable::load(&fixture("conv_ok.json")).unwrap();
        let sensors = table.find_by_topic("sensors/update").unwrap();
        assert_eq!(sensors.can_id, 0x530);
        assert_eq!(sensors.fields[0].kind, FieldKind::U16);
        assert_eq!(sensors.fields[2].kind, FieldKind::Bool);

        // trailing slash trimmed
        assert!(table.find_by_topic("proximity/config").is_some());
    }

    #[test]
    fn test_table_missing_fields() {
        let err = ConversionTable::load(&fixture("conv_missing_fields.json")).unwrap_err();
        assert!(matches!(err, TableError::Empty));
    }

    #[test]
    fn test_table_nested_topic() {
        let table = ConversionTable::load(&fixture("conv_nested.json")).unwrap();
        assert!(table.find_by_topic("led/config").is_some());
        assert!(table.find_by_topic("imu/config").is_some());
    }

    #[test]
    fn test_table_missing_file() {
        let err = ConversionTable::load(Path::new("/nonexistent/conv.json")).unwrap_err();
        assert!(matches!(err, TableError::Read { .. }));
    }

    #[test]
    fn test_table_invalid_json() {
        let err = ConversionTable::from_json_str("{ \"topic\": ").unwrap_err();
        assert!(matches!(err, TableError::Json(_)));
    }

    #[test]
    fn test_table_rejects_oversized_layout() {
        let json = r#"{
            "big":   { "topic": "a/big", "id": 1, "data": { "c1": "hex", "c2": "hex", "c3": "hex" } },
            "small": { "topic": "a/small", "id": 2, "data": { "v": "int" } }
        }"#;
        let table = ConversionTable::from_json_str(json).unwrap();
        assert!(table.find_by_topic("a/big").is_none());
        assert!(table.find_by_topic("a/small").is_some());
    }

    #[test]
    fn test_table_duplicates_first_wins() {
        let json = r#"[
            { "topic": "x/one",   "id": 16, "data": { "a": "int" } },
            { "topic": "x/one",   "id": 17, "data": { "a": "int" } },
            { "topic": "x/two",   "id": 16, "data": { "b": "bool" } }
        ]"#;
        let table = ConversionTable::from_json_str(json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.find_by_topic("x/one").unwrap().can_id, 16);
        assert!(table.find_by_id(17).is_none());
        assert_eq!(table.find_by_id(16).unwrap().topic, "x/one");
        // still reachable from MQTT
        assert_eq!(table.find_by_topic("x/two").unwrap().can_id, 16);
    }

    #[test]
    fn test_table_unknown_type_defaults_to_u8() {
        let json = r#"{ "topic": "t", "id": 3, "data": [ { "name": "v", "type": "float" } ] }"#;
        let table = ConversionTable::from_json_str(json).unwrap();
        assert_eq!(table.find_by_topic("t").unwrap().fields[0].kind, FieldKind::U8);
    }

    #[test]
    fn test_table_rejects_id_over_29_bits() {
        let json = r#"[
            { "topic": "id/max",  "id": 536870911, "data": { "a": "int" } },
            { "topic": "id/over", "id": 536870912, "data": { "a": "int" } }
        ]"#;
        let table = ConversionTable::from_json_str(json).unwrap();
        assert_eq!(table.find_by_topic("id/max").unwrap().can_id, MAX_EXTENDED_ID);
        assert!(table.find_by_topic("id/over").is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_rejects_scalar_data() {
        let json = r#"[
            { "topic": "bad/data", "id": 5, "data": 7 },
            { "topic": "bad/text", "id": 6, "data": "int" },
            { "topic": "ok/data",  "id": 8, "data": [] }
        ]"#;
        let table = ConversionTable::from_json_str(json).unwrap();
        assert!(table.find_by_topic("bad/data").is_none());
        assert!(table.find_by_topic("bad/text").is_none());
        assert!(table.find_by_topic("ok/data").is_some());
    }

    #[test]
    fn test_enum_codes_skip_non_numbers_and_keep_low_byte() {
        let json = r#"{ "topic": "e", "id": 9, "data": [
            { "name": "mode", "type": "enum", "dict": { "A": 1, "B": "x", "C": -1, "D": 258 } }
        ] }"#;
        let table = ConversionTable::from_json_str(json).unwrap();
        let mode = &table.find_by_topic("e").unwrap().fields[0];
        assert_eq!(
            mode.choices,
            vec![("A".to_string(), 1), ("C".to_string(), 0xFF), ("D".to_string(), 2)]
        );
    }

    #[test]
    fn test_object_form_skips_unusable_values() {
        let json = r#"{ "topic": "o", "id": 10, "data": {
            "a": "int", "b": 3, "c": {}, "d": null, "e": ["int"], "f": { "X": 4 }
        } }"#;
        let table = ConversionTable::from_json_str(json).unwrap();
        let fields = &table.find_by_topic("o").unwrap().fields;
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "f"]);
        assert_eq!(fields[1].kind, FieldKind::Enum);
        assert_eq!(fields[1].choices, vec![("X".to_string(), 4)]);
    }

    #[test]
    fn test_parse_can_id_forms() {
        assert_eq!(parse_can_id(&serde_json::json!(1310)), Some(1310));
        assert_eq!(parse_can_id(&serde_json::json!("0x51E")), Some(0x51E));
        assert_eq!(parse_can_id(&serde_json::json!("1310")), Some(1310));
        assert_eq!(parse_can_id(&serde_json::json!(-1)), None);
        assert_eq!(parse_can_id(&serde_json::json!("zz")), None);
    }

    #[test]
    fn test_field_kind_aliases() {
        assert_eq!(FieldKind::parse("UINT16"), Some(FieldKind::U16));
        assert_eq!(FieldKind::parse("Boolean"), Some(FieldKind::Bool));
        assert_eq!(FieldKind::parse("rgb"), Some(FieldKind::Rgb));
        assert_eq!(FieldKind::parse("dict"), Some(FieldKind::Enum));
        assert_eq!(FieldKind::parse("float"), None);
    }
}
