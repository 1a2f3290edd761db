//! Integration tests for the `fieldlink` CLI binary.
//!
//! Argument parsing, config management, and replay/serve runs over small
//! envelope files. Nothing touches the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use predicates::prelude::*;
use serde_json::{Value, json};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `fieldlink` binary with env isolation.
fn fieldlink_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fieldlink");
    cmd.env("HOME", "/tmp/fieldlink-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/fieldlink-cli-test-nonexistent")
        .env_remove("RUST_LOG")
        .env_remove("FIELDLINK_TRACKER__MIN_CONFIDENCE")
        .env_remove("FIELDLINK_TRACKER__MAX_ITEMS")
        .env_remove("FIELDLINK_STORAGE__IMAGE_DIR");
    cmd
}

fn jpeg_b64(len: usize) -> String {
    let mut data = vec![0u8; len];
    data[..3].copy_from_slice(b"\xff\xd8\xff");
    format!("data:image/jpeg;base64,{}", STANDARD.encode(data))
}

fn targets(kind: &str, details: &Value) -> Value {
    json!({
        "route": "targets",
        "body": {
            "target_type": kind,
            "details": details,
            "image_b64": jpeg_b64(128),
        }
    })
}

fn sensors(body: &Value) -> Value {
    json!({"route": "sensors", "body": body})
}

fn write_envelopes(dir: &Path, envelopes: &[Value]) -> std::path::PathBuf {
    let path = dir.join("uploads.ndjson");
    let body: Vec<String> = envelopes.iter().map(Value::to_string).collect();
    std::fs::write(&path, body.join("\n") + "\n").unwrap();
    path
}

fn sample_session() -> Vec<Value> {
    vec![
        sensors(&json!({"co_ppm": 1.2, "temp_c": 21.5})),
        targets("valve", &json!({"state": "open", "confidence": 0.92})),
        targets("valve", &json!({"state": "open", "confidence": 0.93})),
        targets("gauge", &json!({"reading_bar": 2.5, "confidence": 0.9})),
        targets("livedata", &json!({"confidence": 1.0})),
    ]
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = fieldlink_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    fieldlink_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("serve")
            .and(predicate::str::contains("replay"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    fieldlink_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fieldlink"));
}

#[test]
fn test_completions_zsh() {
    fieldlink_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    fieldlink_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_renders_defaults() {
    fieldlink_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[tracker]")
                .and(predicate::str::contains("max_items = 200"))
                .and(predicate::str::contains("min_confidence = 0.75")),
        );
}

#[test]
fn test_config_show_applies_env_overrides() {
    fieldlink_cmd()
        .env("FIELDLINK_TRACKER__MAX_ITEMS", "12")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_items = 12"));
}

#[test]
fn test_invalid_config_is_a_usage_error() {
    fieldlink_cmd()
        .env("FIELDLINK_TRACKER__MIN_CONFIDENCE", "2.5")
        .args(["config", "show"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("min_confidence"));
}

#[test]
fn test_config_path_honours_flag() {
    fieldlink_cmd()
        .args(["config", "path", "--config", "/etc/fieldlink/station.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/etc/fieldlink/station.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldlink.toml");
    let path_arg = path.to_str().unwrap();

    fieldlink_cmd()
        .args(["config", "init", "--config", path_arg])
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("refresh_interval_secs = 4.0"));

    fieldlink_cmd()
        .args(["config", "init", "--config", path_arg])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    fieldlink_cmd()
        .args(["config", "init", "--force", "--config", path_arg])
        .assert()
        .success();
}

// ── Replay ──────────────────────────────────────────────────────────

#[test]
fn test_replay_json_summary() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_envelopes(dir.path(), &sample_session());

    let output = fieldlink_cmd()
        .args(["replay", "--output", "json"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["totals"]["envelopes"], 5);
    assert_eq!(summary["totals"]["detections_submitted"], 4);
    assert_eq!(summary["totals"]["detections_accepted"], 2);
    assert_eq!(summary["totals"]["sensor_readings"], 1);

    let recent = summary["recent_detections"].as_array().unwrap();
    let kinds: Vec<&str> = recent.iter().map(|d| d["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["valve", "gauge"]);
    assert_eq!(recent[0]["details"]["confidence"], 0.92);
    assert!(
        recent[0]["image_url"]
            .as_str()
            .unwrap()
            .starts_with("/static/targets/archive/valve_")
    );

    assert!(summary["throughput"]["aqsa_kbps"].as_f64().unwrap() > 0.0);
    assert!(summary["throughput"]["taip_kbps"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_replay_table_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_envelopes(dir.path(), &sample_session());

    fieldlink_cmd()
        .args(["replay", "--limit", "1"])
        .arg(&input)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("gauge")
                .and(predicate::str::contains("valve").not())
                .and(predicate::str::contains("Throughput: AQSA")),
        );
}

#[test]
fn test_replay_clear_history_empties_the_list() {
    let dir = tempfile::tempdir().unwrap();
    let mut envelopes = sample_session();
    envelopes.push(json!({"route": "clear-history"}));
    let input = write_envelopes(dir.path(), &envelopes);

    let output = fieldlink_cmd()
        .args(["replay", "-o", "json-compact"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["totals"]["clears"], 1);
    assert_eq!(summary["recent_detections"], json!([]));
    assert_eq!(summary["throughput"]["taip_kbps"], 0.0);
}

#[test]
fn test_replay_malformed_envelope_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.ndjson");
    std::fs::write(
        &input,
        format!("{}\n{{\"route\": \"upload\"}}\n", sensors(&json!({"co_ppm": 1}))),
    )
    .unwrap();

    fieldlink_cmd()
        .arg("replay")
        .arg(&input)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Line 2"));
}

#[test]
fn test_replay_rejected_submission_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_envelopes(
        dir.path(),
        &[sensors(&json!({"co_ppm": "high"}))],
    );

    fieldlink_cmd()
        .arg("replay")
        .arg(&input)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Line 1"));
}

#[test]
fn test_replay_missing_file_is_an_io_error() {
    fieldlink_cmd()
        .args(["replay", "/tmp/fieldlink-cli-test-nonexistent/none.ndjson"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Cannot read"));
}

#[test]
fn test_replay_archives_images_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("targets");
    let input = write_envelopes(
        dir.path(),
        &[targets("aruco", &json!({"id": 7, "confidence": 0.99}))],
    );

    fieldlink_cmd()
        .env("FIELDLINK_STORAGE__IMAGE_DIR", &images)
        .args(["replay", "-q"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(images.join("latest.jpg").is_file());
    assert_eq!(std::fs::read_dir(images.join("archive")).unwrap().count(), 1);
}

#[test]
fn test_replay_rejects_tiny_images_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut envelope = targets("valve", &json!({"state": "open", "confidence": 0.9}));
    envelope["body"]["image_b64"] = json!(STANDARD.encode(b"\xff\xd8\xff tiny"));
    let input = write_envelopes(dir.path(), &[envelope]);

    fieldlink_cmd()
        .env("FIELDLINK_STORAGE__IMAGE_DIR", dir.path().join("targets"))
        .arg("replay")
        .arg(&input)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("too small"));
}

// ── Serve ───────────────────────────────────────────────────────────

fn events(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_serve_prints_published_events() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_envelopes(dir.path(), &sample_session());

    let output = fieldlink_cmd()
        .args(["serve", "--input"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let names: Vec<String> = events(&output.stdout)
        .iter()
        .map(|e| e["event"].as_str().unwrap().to_owned())
        .filter(|name| name != "throughput_update")
        .collect();
    assert_eq!(
        names,
        ["sensor_update", "recent_detection", "recent_detection"]
    );
}

#[test]
fn test_serve_reads_stdin_and_skips_bad_lines() {
    let good = targets("valve", &json!({"state": "closed", "confidence": 0.8}));
    let stdin = format!("not json\n\n{good}\n");

    let output = fieldlink_cmd()
        .arg("serve")
        .write_stdin(stdin)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let detections: Vec<Value> = events(&output.stdout)
        .into_iter()
        .filter(|e| e["event"] == "recent_detection")
        .collect();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["data"]["type"], "valve");
    assert_eq!(detections[0]["data"]["details"]["state"], "closed");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("envelope skipped"), "{stderr}");
}
