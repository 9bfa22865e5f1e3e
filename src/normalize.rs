//! Feed payload → `Snapshot` normalization.
//!
//! This is the schema boundary for the WAQI payload: every required field is
//! checked explicitly and reported as `MalformedPayload` naming the field, so
//! an upstream contract change shows up as a typed error rather than a panic
//! deep inside the render cycle.
//!
//! Required: `data.time.v`, `data.aqi`, `data.city.geo`.
//! Optional: `data.iaqi` (per-pollutant readings), `data.city.name`.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::locations;
use crate::logging::{self, Component};
use crate::model::{AqiError, AqiValue, Coordinates, Location, RawPayload, Snapshot};

/// Sentinel WAQI puts in `data.aqi` when a station has no current index.
pub const AQI_UNAVAILABLE: &str = "-";

/// Builds a `Snapshot` from a validated feed payload.
pub fn normalize(raw: &RawPayload) -> Result<Snapshot, AqiError> {
    let data = raw
        .body
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| malformed("data", "missing or not an object"))?;

    let observed_at = parse_time(data)?;
    let overall_index = parse_aqi(data)?;
    let coordinates = parse_geo(data)?;
    let components = parse_components(&raw.location_id, data);

    let label = locations::label_for(&raw.location_id)
        .map(String::from)
        .or_else(|| {
            data.pointer("/city/name")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| raw.location_id.clone());

    Ok(Snapshot::new(
        Location {
            id: raw.location_id.clone(),
            label,
        },
        observed_at,
        overall_index,
        components,
        coordinates,
    ))
}

fn malformed(field: &str, problem: &str) -> AqiError {
    AqiError::MalformedPayload(format!("{}: {}", field, problem))
}

fn parse_time(data: &Value) -> Result<DateTime<Utc>, AqiError> {
    let epoch = data
        .pointer("/time/v")
        .ok_or_else(|| malformed("data.time.v", "missing"))?
        .as_i64()
        .ok_or_else(|| malformed("data.time.v", "not an integer epoch timestamp"))?;
    Utc.timestamp_opt(epoch, 0)
        .single()
        .ok_or_else(|| malformed("data.time.v", "timestamp out of range"))
}

fn parse_aqi(data: &Value) -> Result<AqiValue, AqiError> {
    match data.get("aqi") {
        None => Err(malformed("data.aqi", "missing")),
        Some(Value::String(s)) if s.trim() == AQI_UNAVAILABLE => Ok(AqiValue::Unavailable),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(AqiValue::Available)
            .ok_or_else(|| malformed("data.aqi", &format!("not a non-negative integer: {}", n))),
        Some(other) => Err(malformed("data.aqi", &format!("unexpected value {}", other))),
    }
}

fn parse_geo(data: &Value) -> Result<Coordinates, AqiError> {
    let geo = data
        .pointer("/city/geo")
        .ok_or_else(|| malformed("data.city.geo", "missing"))?
        .as_array()
        .ok_or_else(|| malformed("data.city.geo", "not an array"))?;
    match geo.as_slice() {
        [lat, lon] => match (lat.as_f64(), lon.as_f64()) {
            (Some(latitude), Some(longitude)) => Ok(Coordinates {
                latitude,
                longitude,
            }),
            _ => Err(malformed("data.city.geo", "coordinates are not numeric")),
        },
        _ => Err(malformed(
            "data.city.geo",
            &format!("expected [lat, lon], got {} elements", geo.len()),
        )),
    }
}

/// Per-pollutant readings. A missing `iaqi` block is an empty map; entries
/// without a numeric `v` are skipped. Codes differing only in case collapse
/// to one upper-cased key, and the first one seen is kept.
fn parse_components(location_id: &str, data: &Value) -> BTreeMap<String, f64> {
    let mut components = BTreeMap::new();
    let Some(iaqi) = data.get("iaqi").and_then(Value::as_object) else {
        return components;
    };
    for (code, reading) in iaqi {
        match reading.get("v").and_then(Value::as_f64) {
            Some(v) => match components.entry(code.to_uppercase()) {
                Entry::Vacant(slot) => {
                    slot.insert(v);
                }
                Entry::Occupied(kept) => logging::debug(
                    Component::Waqi,
                    Some(location_id),
                    &format!(
                        "dropping component '{}' = {}: collides with {} = {}",
                        code,
                        v,
                        kept.key(),
                        kept.get()
                    ),
                ),
            },
            None => logging::debug(
                Component::Waqi,
                Some(location_id),
                &format!("skipping component '{}' without numeric value", code),
            ),
        }
    }
    components
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(location_id: &str, body: Value) -> RawPayload {
        RawPayload {
            location_id: location_id.to_string(),
            body,
        }
    }

    fn full_body() -> Value {
        json!({
            "status": "ok",
            "data": {
                "aqi": 57,
                "time": { "s": "2024-05-01 15:00:00", "tz": "+03:00", "v": 1714564800 },
                "city": { "geo": [36.8969, 30.7133], "name": "Antalya, Turkey" },
                "iaqi": {
                    "pm25": { "v": 57 },
                    "pm10": { "v": 23.5 },
                    "o3": { "v": 11.2 },
                    "t": { "v": 24 }
                }
            }
        })
    }

    #[test]
    fn test_full_payload_normalizes() {
        let snapshot = normalize(&payload("antalya", full_body())).expect("valid payload");
        assert_eq!(snapshot.location().id, "antalya");
        assert_eq!(snapshot.location().label, "Antalya");
        assert_eq!(snapshot.observed_at(), Utc.timestamp_opt(1714564800, 0).unwrap());
        assert_eq!(snapshot.overall_index(), AqiValue::Available(57));
        assert_eq!(
            snapshot.coordinates(),
            Coordinates { latitude: 36.8969, longitude: 30.7133 }
        );
        assert_eq!(snapshot.components().len(), 4);
        assert_eq!(snapshot.component("PM25"), Some(57.0));
        assert_eq!(snapshot.component("PM10"), Some(23.5));
    }

    #[test]
    fn test_component_keys_are_uppercase() {
        let snapshot = normalize(&payload("antalya", full_body())).expect("valid payload");
        for key in snapshot.components().keys() {
            assert_eq!(key, &key.to_uppercase(), "component key '{}' not upper-case", key);
        }
    }

    #[test]
    fn test_case_colliding_codes_keep_first_value() {
        let mut body = full_body();
        body["data"]["iaqi"] = json!({ "PM25": { "v": 20 }, "pm25": { "v": 57 } });
        let snapshot = normalize(&payload("antalya", body)).expect("valid payload");
        assert_eq!(snapshot.components().len(), 1);
        assert_eq!(snapshot.component("PM25"), Some(20.0));
    }

    #[test]
    fn test_missing_iaqi_gives_empty_components() {
        let mut body = full_body();
        body["data"].as_object_mut().unwrap().remove("iaqi");
        let snapshot = normalize(&payload("antalya", body)).expect("iaqi is optional");
        assert!(snapshot.components().is_empty());
    }

    #[test]
    fn test_non_numeric_component_is_skipped() {
        let mut body = full_body();
        body["data"]["iaqi"]["no2"] = json!({ "v": "n/a" });
        body["data"]["iaqi"]["so2"] = json!({});
        let snapshot = normalize(&payload("antalya", body)).expect("valid payload");
        assert_eq!(snapshot.component("NO2"), None);
        assert_eq!(snapshot.component("SO2"), None);
        assert_eq!(snapshot.components().len(), 4);
    }

    #[test]
    fn test_dash_aqi_is_unavailable() {
        let mut body = full_body();
        body["data"]["aqi"] = json!("-");
        let snapshot = normalize(&payload("antalya", body)).expect("'-' is a valid sentinel");
        assert_eq!(snapshot.overall_index(), AqiValue::Unavailable);
    }

    #[test]
    fn test_index_above_scale_is_kept_verbatim() {
        let mut body = full_body();
        body["data"]["aqi"] = json!(812);
        let snapshot = normalize(&payload("antalya", body)).expect("valid payload");
        assert_eq!(snapshot.overall_index(), AqiValue::Available(812));
    }

    #[test]
    fn test_missing_required_fields_are_malformed() {
        for pointer in ["/data/time", "/data/aqi", "/data/city/geo"] {
            let mut body = full_body();
            let (parent, field) = pointer.rsplit_once('/').unwrap();
            body.pointer_mut(parent)
                .and_then(Value::as_object_mut)
                .unwrap()
                .remove(field);
            let result = normalize(&payload("antalya", body));
            assert!(
                matches!(result, Err(AqiError::MalformedPayload(_))),
                "removing {} should be malformed, got {:?}",
                pointer,
                result
            );
        }
    }

    #[test]
    fn test_wrong_shapes_are_malformed() {
        let cases = [
            ("/data/aqi", json!(-5)),
            ("/data/aqi", json!(42.5)),
            ("/data/aqi", json!("n/a")),
            ("/data/aqi", json!(null)),
            ("/data/time/v", json!("1714564800")),
            ("/data/city/geo", json!([36.8969])),
            ("/data/city/geo", json!(["36.8", "30.7"])),
            ("/data/city/geo", json!({ "lat": 36.8, "lon": 30.7 })),
        ];
        for (pointer, value) in cases {
            let mut body = full_body();
            *body.pointer_mut(pointer).unwrap() = value.clone();
            let result = normalize(&payload("antalya", body));
            assert!(
                matches!(result, Err(AqiError::MalformedPayload(_))),
                "{} = {} should be malformed, got {:?}",
                pointer,
                value,
                result
            );
        }
    }

    #[test]
    fn test_missing_data_block_is_malformed() {
        let result = normalize(&payload("antalya", json!({ "status": "ok" })));
        assert!(matches!(result, Err(AqiError::MalformedPayload(_))));
    }

    #[test]
    fn test_label_falls_back_to_city_name_then_id() {
        let snapshot = normalize(&payload("@4018", full_body())).expect("valid payload");
        assert_eq!(snapshot.location().label, "Antalya, Turkey");

        let mut body = full_body();
        body["data"]["city"].as_object_mut().unwrap().remove("name");
        let snapshot = normalize(&payload("@4018", body)).expect("valid payload");
        assert_eq!(snapshot.location().label, "@4018");
    }
}
