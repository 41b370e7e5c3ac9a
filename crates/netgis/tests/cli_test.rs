//! Integration tests for the `netgis` CLI binary.
//!
//! Offline commands run against the built-in layer registry; commands that
//! need the service run against a wiremock server passed via `--server`.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `netgis` binary with env isolation.
///
/// Clears all `NETGIS_*` env vars and points config directories at `home`
/// so tests never touch the user's real configuration.
fn netgis_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("netgis");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("NETGIS_PROFILE")
        .env_remove("NETGIS_SERVER")
        .env_remove("NETGIS_TOKEN")
        .env_remove("NETGIS_REGIONS")
        .env_remove("NETGIS_OUTPUT")
        .env_remove("NETGIS_INSECURE")
        .env_remove("NETGIS_TIMEOUT");
    cmd
}

/// Command against a mock service, with a token and region 1.
fn service_cmd(home: &Path, server: &MockServer) -> assert_cmd::Command {
    let mut cmd = netgis_cmd(home);
    cmd.args(["--server", &server.uri(), "--token", "test-token", "--regions", "1"]);
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = netgis_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("GIS")
            .and(predicate::str::contains("layers"))
            .and(predicate::str::contains("fetch"))
            .and(predicate::str::contains("validate")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netgis"));
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_fetch_without_config_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["fetch", "p_dp"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_unknown_profile_is_reported() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["--profile", "staging", "fetch", "p_dp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));
}

#[test]
fn test_bad_bbox_is_rejected_by_parser() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["fetch", "p_dp", "--bbox", "12.1,77.0,11.9,77.1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("south < north"));
}

// ── Layers (offline) ────────────────────────────────────────────────

#[test]
fn test_layers_list() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["layers", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("p_dp")
                .and(predicate::str::contains("Distribution Point"))
                .and(predicate::str::contains("p_cable")),
        );
}

#[test]
fn test_layers_list_plain() {
    let home = tempfile::tempdir().unwrap();
    let output = netgis_cmd(home.path())
        .args(["layers", "list", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|l| l == "p_dp"), "{stdout}");
}

#[test]
fn test_layers_show_lists_form_fields() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["layers", "show", "p_cable"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Polyline")
                .and(predicate::str::contains("cable_type"))
                .and(predicate::str::contains("CB")),
        );
}

#[test]
fn test_unknown_layer_is_not_found() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["layers", "show", "p_nope"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("p_nope"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_set_then_show() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["config", "set", "server", "https://gis.example.net"])
        .assert()
        .success();
    netgis_cmd(home.path())
        .args(["config", "set", "token", "plain-secret"])
        .assert()
        .success();

    netgis_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("https://gis.example.net")
                .and(predicate::str::contains("****"))
                .and(predicate::str::contains("plain-secret").not()),
        );

    netgis_cmd(home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default *"));
}

#[test]
fn test_config_set_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["config", "set", "controller", "x"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown config key"));
}

#[test]
fn test_config_use_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    netgis_cmd(home.path())
        .args(["config", "use", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("prod"));
}

// ── Service-backed commands ─────────────────────────────────────────

fn points(n: u32) -> Value {
    Value::Array(
        (0..n)
            .map(|i| {
                let d = f64::from(i) * 0.001;
                json!({"id": i + 1, "coordinates": [77.0 + d, 12.0 + d], "status": "RFS"})
            })
            .collect(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_regions_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/region/list/summary/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "North", "unique_id": "RN1"},
            {"id": 2, "name": "South", "unique_id": "RS1", "parent": 1}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    service_cmd(home.path(), &server)
        .args(["regions", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("North")
                .and(predicate::str::contains("RS1")),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_small_layer_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/gis-layer/data/"))
        .and(body_partial_json(json!({"layer_key": "p_dp"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(points(3)))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let output = service_cmd(home.path(), &server)
        .args(["fetch", "p_dp", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<u64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_large_layer_needs_bbox() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/gis-layer/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(points(30)))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    service_cmd(home.path(), &server)
        .args(["--cache-threshold", "10", "fetch", "p_dp", "-o", "plain"])
        .assert()
        .success()
        .stderr(predicate::str::contains("--bbox"));

    // The first five points fall inside this box.
    let output = service_cmd(home.path(), &server)
        .args([
            "--cache-threshold",
            "10",
            "fetch",
            "p_dp",
            "-o",
            "plain",
            "--bbox",
            "11.9999,76.9999,12.0045,77.0045",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_rejects_unknown_status() {
    let server = MockServer::start().await;
    let home = tempfile::tempdir().unwrap();
    service_cmd(home.path(), &server)
        .args(["fetch", "p_dp", "--status", "DONE"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("DONE"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validate_reports_parent_and_network_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/gis-layer/validate-geometry/"))
        .and(body_partial_json(json!({
            "layer_key": "p_dp",
            "geometry": [77.5, 12.9],
            "region_id_list": [1]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "parents": [{"id": 4, "layer_key": "p_sa", "network_id": "RN1-SA0001"}],
            "children": [],
            "region_list": [{"id": 1, "name": "North", "unique_id": "RN1"}],
            "soft_errors": ["close to another DP"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let output = service_cmd(home.path(), &server)
        .args(["validate", "p_dp", "--geometry", "[77.5, 12.9]", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(
        report["network_id"]
            .as_str()
            .unwrap()
            .starts_with("RN1-SA0001-DP")
    );
    assert_eq!(report["parents"][0]["layer_key"], "p_sa");
    assert!(String::from_utf8_lossy(&output.stderr).contains("close to another DP"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validate_intersecting_geometry_is_a_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/gis-layer/validate-geometry/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_type": "intersects",
            "data": [[[77.0, 12.0], [77.1, 12.0], [77.1, 12.1]]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    service_cmd(home.path(), &server)
        .args([
            "validate",
            "p_cable",
            "--geometry",
            "[[77.0, 12.0], [77.2, 12.2]]",
        ])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("intersects"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validate_shape_mismatch_is_caught_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/gis-layer/validate-geometry/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    service_cmd(home.path(), &server)
        .args(["validate", "p_dp", "--geometry", "[[77.0, 12.0], [77.2, 12.2]]"])
        .assert()
        .code(2);
}
