// ── Sensor readings ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reading fields a sensor payload may carry. At least one is required.
pub const SENSOR_FIELDS: [&str; 7] = [
    "co_ppm",
    "no2_ppm",
    "nh3_ppm",
    "light_lux",
    "temp_c",
    "pressure_hpa",
    "humidity_pct",
];

/// One air-quality / environment sample from a field device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub ts: DateTime<Utc>,
    pub co_ppm: Option<f64>,
    pub no2_ppm: Option<f64>,
    pub nh3_ppm: Option<f64>,
    pub light_lux: Option<f64>,
    pub temp_c: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub source: String,
}

impl SensorReading {
    /// Empty reading at `ts`, every field unset.
    pub fn empty(ts: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self {
            ts,
            co_ppm: None,
            no2_ppm: None,
            nh3_ppm: None,
            light_lux: None,
            temp_c: None,
            pressure_hpa: None,
            humidity_pct: None,
            source: source.into(),
        }
    }

    /// Mutable access to a reading field by its wire name.
    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut Option<f64>> {
        match name {
            "co_ppm" => Some(&mut self.co_ppm),
            "no2_ppm" => Some(&mut self.no2_ppm),
            "nh3_ppm" => Some(&mut self.nh3_ppm),
            "light_lux" => Some(&mut self.light_lux),
            "temp_c" => Some(&mut self.temp_c),
            "pressure_hpa" => Some(&mut self.pressure_hpa),
            "humidity_pct" => Some(&mut self.humidity_pct),
            _ => None,
        }
    }
}
