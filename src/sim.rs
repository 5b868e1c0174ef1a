// src/sim.rs
//
// Random but valid payloads for the simulation tools. Values stay within
// what pack_payload accepts, and a few field names get a narrower range so
// the traffic looks like real device settings.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::pack::clamp;
use crate::table::{Entry, FieldKind, FieldSpec};

/// Colours sent for RGB fields
pub const PALETTE: [&str; 9] = [
    "#FF0000", "#00FF00", "#0000FF", "#00FDFF", "#FFFFFF", "#FF00FF", "#00FFFF", "#FFA500",
    "#00AA88",
];

/// Enum fallback when a dictionary is empty
const DEFAULT_ENUM_KEY: &str = "ON";

fn u8_range(name: &str) -> (u8, u8) {
    match name.to_ascii_lowercase().as_str() {
        "intensity" | "brightness" => (0, 255),
        "group_id" | "group" | "id" | "pic_id" => (1, 4),
        "interval" | "period" | "delay_ms" | "touchthreshold" | "proximitythreshold"
        | "touchscaling" | "proximityscaling" => (0, 50),
        _ => (0, 255),
    }
}

/// One random value for a field
pub fn rand_for_field<R: Rng + ?Sized>(field: &FieldSpec, rng: &mut R) -> Value {
    match field.kind {
        FieldKind::U8 => {
            let (lo, hi) = u8_range(&field.name);
            Value::from(rng.gen_range(lo..=hi))
        }
        FieldKind::Bool => Value::Bool(rng.gen_bool(0.5)),
        FieldKind::Rgb => {
            let colour = PALETTE.choose(rng).copied().unwrap_or(PALETTE[0]);
            Value::String(colour.to_string())
        }
        FieldKind::U16 => Value::from(rng.gen_range(0u16..=30000)),
        FieldKind::Enum => {
            let key = field
                .choices
                .choose(rng)
                .map(|(k, _)| k.as_str())
                .unwrap_or(DEFAULT_ENUM_KEY);
            Value::String(key.to_string())
        }
    }
}

/// A full command object for an entry, in field order
pub fn build_payload<R: Rng + ?Sized>(entry: &Entry, rng: &mut R) -> Map<String, Value> {
    let mut obj = Map::new();
    for field in &entry.fields {
        let mut value = rand_for_field(field, rng);
        if field.name == "intensity" {
            if let Some(n) = value.as_i64() {
                value = Value::from(clamp(n, 0, 255));
            }
        }
        obj.insert(field.name.clone(), value);
    }
    obj
}

/// `--period` argument of the simulators: non-negative, finite seconds.
pub fn parse_period(text: &str) -> Result<Duration, String> {
    let secs: f64 = text
        .trim()
        .parse()
        .map_err(|_| format!("{:?} is not a number of seconds", text))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("period {} is out of range", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{pack_payload, parse_hex_rgb};
    use crate::test_support::reference_table;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_payloads_always_pack() {
        let table = reference_table();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            for entry in table.entries() {
                let payload = Value::Object(build_payload(entry, &mut rng));
                assert!(
                    pack_payload(entry, &payload).is_ok(),
                    "{} did not pack: {}",
                    entry.topic,
                    payload
                );
            }
        }
    }

    #[test]
    fn test_payload_follows_field_order() {
        let table = reference_table();
        let entry = table.find_by_topic("led/config").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let keys: Vec<String> = build_payload(entry, &mut rng).keys().cloned().collect();
        assert_eq!(keys, vec!["group_id", "intensity", "color", "mode", "interval"]);
    }

    #[test]
    fn test_name_heuristics() {
        let mut rng = StdRng::seed_from_u64(3);
        let group = FieldSpec::new("group_id", FieldKind::U8);
        let threshold = FieldSpec::new("touchThreshold", FieldKind::U8);
        for _ in 0..100 {
            let g = rand_for_field(&group, &mut rng).as_u64().unwrap();
            assert!((1..=4).contains(&g));
            let t = rand_for_field(&threshold, &mut rng).as_u64().unwrap();
            assert!(t <= 50);
        }
    }

    #[test]
    fn test_colour_and_enum_choices() {
        let mut rng = StdRng::seed_from_u64(5);
        let colour = FieldSpec::new("color", FieldKind::Rgb);
        let value = rand_for_field(&colour, &mut rng);
        assert!(PALETTE.contains(&value.as_str().unwrap()));
        assert!(PALETTE.iter().all(|c| parse_hex_rgb(c).is_some()));

        let empty = FieldSpec::new("mode", FieldKind::Enum);
        assert_eq!(rand_for_field(&empty, &mut rng), Value::from("ON"));

        let mode = FieldSpec::new("mode", FieldKind::Enum)
            .with_choices(vec![("OFF".to_string(), 0), ("ON".to_string(), 1)]);
        let key = rand_for_field(&mode, &mut rng);
        assert!(key == "OFF" || key == "ON");
    }

    #[test]
    fn test_u16_range() {
        let mut rng = StdRng::seed_from_u64(9);
        let period = FieldSpec::new("period", FieldKind::U16);
        for _ in 0..100 {
            assert!(rand_for_field(&period, &mut rng).as_u64().unwrap() <= 30000);
        }
    }

    #[test]
    fn test_parse_period_accepts_finite_seconds() {
        assert_eq!(parse_period("1.0").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_period("0.25").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_period("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_period_rejects_unrepresentable_values() {
        for text in ["inf", "-1", "NaN", "1e30", "abc", ""] {
            assert!(parse_period(text).is_err(), "{text} should be rejected");
        }
    }
}
