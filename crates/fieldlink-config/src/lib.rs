//! Configuration for the fieldlink ground station.
//!
//! A TOML file layered over built-in defaults, with `FIELDLINK_*`
//! environment overrides on top, translated into
//! `fieldlink_core::StationConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fieldlink_core::{EVENT_CHANNEL_SIZE, MeterConfig, StationConfig, TrackerConfig};

/// Environment variable prefix. Nested keys are separated by `__`, e.g.
/// `FIELDLINK_TRACKER__MAX_ITEMS=100`.
pub const ENV_PREFIX: &str = "FIELDLINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerSection,

    #[serde(default)]
    pub meter: MeterSection,

    #[serde(default)]
    pub broadcast: BroadcastSection,

    #[serde(default)]
    pub storage: StorageSection,
}

/// `[tracker]`: recent-detection de-duplication.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrackerSection {
    /// Seconds an accepted detection stays listed.
    #[serde(default = "default_tracker_window")]
    pub window_secs: f64,

    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Detections below this confidence are ignored.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Seconds before the same object is shown again.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: f64,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            window_secs: default_tracker_window(),
            max_items: default_max_items(),
            min_confidence: default_min_confidence(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

fn default_tracker_window() -> f64 {
    3600.0
}
fn default_max_items() -> usize {
    200
}
fn default_min_confidence() -> f64 {
    0.75
}
fn default_refresh_interval() -> f64 {
    4.0
}

/// `[meter]`: upload throughput.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MeterSection {
    #[serde(default = "default_meter_window")]
    pub window_secs: f64,
}

impl Default for MeterSection {
    fn default() -> Self {
        Self {
            window_secs: default_meter_window(),
        }
    }
}

fn default_meter_window() -> f64 {
    4.0
}

/// `[broadcast]`: live-update channel.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BroadcastSection {
    /// Seconds between throughput broadcasts. Defaults to the tracker
    /// refresh interval.
    pub interval_secs: Option<f64>,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            interval_secs: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    EVENT_CHANNEL_SIZE
}

/// `[storage]`: where detection images are archived.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageSection {
    /// Directory receiving `latest.jpg` and the `archive/` folder. Images are
    /// not written to disk when unset.
    pub image_dir: Option<PathBuf>,

    /// URL prefix the image directory is served under.
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            image_dir: None,
            url_prefix: default_url_prefix(),
        }
    }
}

fn default_url_prefix() -> String {
    "/static/targets".into()
}

// ── Validation and translation ──────────────────────────────────────

fn positive_secs(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::invalid(
            field,
            format!("must be a positive number of seconds, got {secs}"),
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::invalid(field, e.to_string()))
}

impl Config {
    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_station_config().map(|_| ())
    }

    /// Translate into the core's runtime configuration.
    pub fn to_station_config(&self) -> Result<StationConfig, ConfigError> {
        let t = &self.tracker;
        if t.max_items == 0 {
            return Err(ConfigError::invalid("tracker.max_items", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&t.min_confidence) {
            return Err(ConfigError::invalid(
                "tracker.min_confidence",
                format!("must be between 0 and 1, got {}", t.min_confidence),
            ));
        }
        if self.broadcast.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "broadcast.channel_capacity",
                "must be at least 1",
            ));
        }

        let tracker = TrackerConfig {
            window: positive_secs("tracker.window_secs", t.window_secs)?,
            max_items: t.max_items,
            min_confidence: t.min_confidence,
            refresh_interval: positive_secs(
                "tracker.refresh_interval_secs",
                t.refresh_interval_secs,
            )?,
        };
        let meter = MeterConfig {
            window: positive_secs("meter.window_secs", self.meter.window_secs)?,
        };
        let broadcast_interval = self
            .broadcast
            .interval_secs
            .map(|secs| positive_secs("broadcast.interval_secs", secs))
            .transpose()?;

        Ok(StationConfig {
            tracker,
            meter,
            broadcast_interval,
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "fieldlink", "fieldlink").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("fieldlink");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate config from the platform path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(None)
}

/// Load and validate config from `path` (or the platform path) plus
/// environment. A missing file is not an error.
pub fn load_config_from(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Render the built-in defaults as a TOML document.
pub fn default_toml() -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(&Config::default())?)
}

/// Serialize config to TOML and write it to `path`, creating parent
/// directories as needed.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_translate_to_core_defaults() {
        let station = Config::default().to_station_config().unwrap();
        assert_eq!(station, StationConfig::default());
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let mut cfg = Config::default();
        cfg.tracker.min_confidence = 1.5;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.starts_with("invalid tracker.min_confidence"), "{err}");
    }

    #[test]
    fn rejects_non_positive_windows() {
        let mut cfg = Config::default();
        cfg.meter.window_secs = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tracker.refresh_interval_secs = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.broadcast.interval_secs = Some(-1.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_buffer() {
        let mut cfg = Config::default();
        cfg.tracker.max_items = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "tracker.max_items"
        ));
    }

    #[test]
    fn explicit_broadcast_interval() {
        let mut cfg = Config::default();
        cfg.broadcast.interval_secs = Some(1.5);
        let station = cfg.to_station_config().unwrap();
        assert_eq!(station.broadcast_interval(), Duration::from_millis(1500));
    }
}
