use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn perfgrade(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("perfgrade").unwrap();
    cmd.current_dir(dir)
        .env_remove("PERFGRADE_URL")
        .env_remove("PERFGRADE_CONFIG")
        .env("RUST_LOG", "warn");
    cmd
}

fn write_report(path: &Path, label: &str, rps: f64, p90: f64) {
    let report = json!({
        "label": label,
        "timestamp": "2024-05-01T12:00:00.000Z",
        "endpoints": {
            "GET /pets": {
                "method": "GET",
                "path": "/pets",
                "rps": rps,
                "latency": { "p50": p90 / 2.0, "p90": p90, "p99": p90 * 1.5 },
                "errors": 0
            }
        }
    });
    fs::write(path, serde_json::to_string_pretty(&report).unwrap()).unwrap();
}

#[test]
fn local_spec_without_url_is_config_error() {
    let dir = tempdir().unwrap();
    perfgrade(dir.path())
        .args(["bench", "openapi.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn missing_spec_is_config_error() {
    let dir = tempdir().unwrap();
    perfgrade(dir.path())
        .arg("bench")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no API spec given"));
}

#[test]
fn unsupported_output_extension_is_config_error() {
    let dir = tempdir().unwrap();
    perfgrade(dir.path())
        .args(["bench", "http://127.0.0.1:9/openapi.json", "-o", "report.xml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("xml"));
    assert!(!dir.path().join("report.xml").exists());
}

#[test]
fn bad_config_file_is_config_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("perfgrade.yaml"), "conections: 3\n").unwrap();
    perfgrade(dir.path())
        .args(["bench", "http://127.0.0.1:9/openapi.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("perfgrade.yaml"));
}

#[test]
fn unreachable_spec_is_resolution_error() {
    let dir = tempdir().unwrap();
    perfgrade(dir.path())
        .args(["bench", "openapi.yaml", "--url", "http://127.0.0.1:9"])
        .assert()
        .code(3);
}

#[test]
fn compare_of_two_reports_writes_output() {
    let dir = tempdir().unwrap();
    write_report(&dir.path().join("base.json"), "before", 100.0, 200.0);
    write_report(&dir.path().join("target.json"), "after", 150.0, 100.0);

    perfgrade(dir.path())
        .args(["compare", "base.json", "target.json", "-o", "diff.csv"])
        .assert()
        .success();

    let csv = fs::read_to_string(dir.path().join("diff.csv")).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("\"method\""));
    let row = lines.next().unwrap();
    assert!(row.contains("\"/pets\""), "{row}");
}

#[test]
fn compare_prints_summary_to_stdout_without_output() {
    let dir = tempdir().unwrap();
    write_report(&dir.path().join("base.json"), "before", 100.0, 200.0);
    write_report(&dir.path().join("target.json"), "after", 100.0, 100.0);

    perfgrade(dir.path())
        .args(["compare", "base.json", "target.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("before (baseline) vs after (target)"))
        .stdout(predicate::str::contains("GET /pets"));
}

#[test]
fn malformed_report_is_config_error() {
    let dir = tempdir().unwrap();
    write_report(&dir.path().join("base.json"), "before", 100.0, 200.0);
    fs::write(dir.path().join("broken.json"), "{\"label\": \"x\", \"endpoints\": ").unwrap();

    perfgrade(dir.path())
        .args(["compare", "base.json", "broken.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("report format error"));
}

#[test]
fn schema_violation_is_config_error() {
    let dir = tempdir().unwrap();
    write_report(&dir.path().join("base.json"), "before", 100.0, 200.0);
    let mut bad: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("base.json")).unwrap()).unwrap();
    bad["endpoints"]["GET /pets"]["rps"] = json!("fast");
    fs::write(dir.path().join("bad.json"), bad.to_string()).unwrap();

    perfgrade(dir.path())
        .args(["compare", "base.json", "bad.json"])
        .assert()
        .code(2);
}

#[test]
fn version_prints_package_version() {
    let dir = tempdir().unwrap();
    perfgrade(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
