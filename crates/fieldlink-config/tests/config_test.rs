#![allow(clippy::unwrap_used)]
// Loading config from files and the environment.

use std::path::Path;
use std::time::Duration;

use figment::Jail;
use pretty_assertions::assert_eq;

use fieldlink_config::{Config, ConfigError, default_toml, load_config_from, save_config_to};

fn load(path: &str) -> Result<Config, ConfigError> {
    load_config_from(Some(Path::new(path)))
}

#[test]
fn missing_file_yields_defaults() {
    Jail::expect_with(|_jail| {
        let cfg = load("does-not-exist.toml").map_err(|e| e.to_string())?;
        assert_eq!(cfg, Config::default());
        Ok(())
    });
}

#[test]
fn file_values_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "fieldlink.toml",
            r#"
                [tracker]
                max_items = 50
                min_confidence = 0.6

                [broadcast]
                interval_secs = 2.0

                [storage]
                image_dir = "/var/lib/fieldlink/targets"
            "#,
        )?;

        let cfg = load("fieldlink.toml").map_err(|e| e.to_string())?;
        assert_eq!(cfg.tracker.max_items, 50);
        assert!((cfg.tracker.refresh_interval_secs - 4.0).abs() < f64::EPSILON);
        assert_eq!(cfg.storage.url_prefix, "/static/targets");

        let station = cfg.to_station_config().map_err(|e| e.to_string())?;
        assert_eq!(station.tracker.max_items, 50);
        assert_eq!(station.broadcast_interval(), Duration::from_secs(2));
        Ok(())
    });
}

#[test]
fn environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("fieldlink.toml", "[tracker]\nmax_items = 50\n")?;
        jail.set_env("FIELDLINK_TRACKER__MAX_ITEMS", "10");
        jail.set_env("FIELDLINK_METER__WINDOW_SECS", "8");

        let cfg = load("fieldlink.toml").map_err(|e| e.to_string())?;
        assert_eq!(cfg.tracker.max_items, 10);
        assert!((cfg.meter.window_secs - 8.0).abs() < f64::EPSILON);
        Ok(())
    });
}

#[test]
fn invalid_values_are_rejected_on_load() {
    Jail::expect_with(|jail| {
        jail.create_file("fieldlink.toml", "[tracker]\nmin_confidence = 2.0\n")?;
        let err = load("fieldlink.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }), "{err}");
        Ok(())
    });
}

#[test]
fn malformed_toml_is_a_load_error() {
    Jail::expect_with(|jail| {
        jail.create_file("fieldlink.toml", "[tracker\nmax_items = ")?;
        assert!(matches!(
            load("fieldlink.toml"),
            Err(ConfigError::Figment(_))
        ));
        Ok(())
    });
}

#[test]
fn saved_defaults_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    save_config_to(&Config::default(), &path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, default_toml().unwrap());
    assert!(written.contains("[tracker]"));
    assert!(written.contains("max_items = 200"));

    let reloaded: Config = toml::from_str(&written).unwrap();
    assert_eq!(reloaded, Config::default());
}
