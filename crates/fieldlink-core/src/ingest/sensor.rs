// ── Sensor payload validation ──

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::normalize::parse_timestamp;
use crate::error::CoreError;
use crate::model::detection::coerce_f64;
use crate::model::{SENSOR_FIELDS, SensorReading};

/// `source` recorded when the payload does not name one.
pub const DEFAULT_SOURCE: &str = "payload";

/// Validate a sensor upload and turn it into a [`SensorReading`].
///
/// At least one reading field must be present and every non-null reading
/// must be numeric. A missing or unparseable `timestamp` falls back to
/// `received_at`.
pub fn parse_sensor_payload(
    payload: &Value,
    received_at: DateTime<Utc>,
) -> Result<SensorReading, CoreError> {
    let Some(map) = payload.as_object() else {
        return Err(CoreError::invalid_payload(
            "sensor payload must be a JSON object",
        ));
    };

    if !SENSOR_FIELDS.iter().any(|field| map.contains_key(*field)) {
        return Err(CoreError::invalid_payload(
            "at least one sensor reading is required",
        ));
    }

    let ts = map
        .get("timestamp")
        .and_then(parse_timestamp)
        .unwrap_or(received_at);
    let source = map
        .get("source")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_SOURCE);

    let mut reading = SensorReading::empty(ts, source);
    for field in SENSOR_FIELDS {
        let value = match map.get(field) {
            None | Some(Value::Null) => continue,
            Some(value) => coerce_f64(value).ok_or_else(|| {
                CoreError::invalid_payload(format!("invalid value for {field}: must be numeric"))
            })?,
        };
        if let Some(slot) = reading.field_mut(field) {
            *slot = Some(value);
        }
    }

    Ok(reading)
}
