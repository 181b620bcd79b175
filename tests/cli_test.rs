//! CLI behaviour through the built binary

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn trip_metrics(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("trip-metrics").unwrap();
    cmd.current_dir(dir.path())
        .env("LOG_LEVEL", "ERROR")
        .env_remove("TRIP_METRICS_SERVER_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_summary_json() {
    let dir = TempDir::new().unwrap();
    let input = write_file(dir.path(), "trips.jsonl", &trips_jsonl("2024-05-01", 14)).unwrap();

    let output = trip_metrics(&dir)
        .args(["summary", "--json", "--input"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let metrics = json["summary"]["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 3);
    assert_eq!(json["summary"]["range"], serde_json::json!(["2024-05-01", "2024-05-14"]));
}

#[test]
fn test_footprint_text_output() {
    let dir = TempDir::new().unwrap();
    let input = write_file(dir.path(), "trips.jsonl", &trips_jsonl("2024-05-01", 14)).unwrap();
    let aggregate = write_file(dir.path(), "agg.json", &aggregate_json("2024-05-01", 14)).unwrap();

    trip_metrics(&dir)
        .arg("footprint")
        .arg("--input")
        .arg(&input)
        .arg("--aggregate")
        .arg(&aggregate)
        .assert()
        .success()
        .stdout(predicate::str::contains("Past week (5/8 - 5/14)²"))
        .stdout(predicate::str::contains("Group average"))
        .stdout(predicate::str::contains("kg CO₂"));
}

#[test]
fn test_chart_with_window() {
    let dir = TempDir::new().unwrap();
    let input = write_file(dir.path(), "trips.jsonl", &trips_jsonl("2024-05-01", 14)).unwrap();

    let output = trip_metrics(&dir)
        .args(["chart", "--json", "--metric", "duration"])
        .args(["--since", "2024-05-10", "--end", "2024-05-12", "--input"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = json["chart"]["records"].as_array().unwrap();
    assert_eq!(records.len(), 6);
    assert_eq!(records.last().unwrap()["label"], "Unlabeled");
    assert_eq!(json["chart"]["axis_label"], "hours");
}

#[test]
fn test_dashboard_reads_days_document() {
    let dir = TempDir::new().unwrap();
    let days = r#"{"days": [
        {"date": "2024-05-01", "metrics": {"distance": {"mode_confirm": {"BUS": 10000}}}},
        {"date": "2024-05-02", "metrics": {"distance": {"mode_confirm": {"BUS": 10000}}}}
    ]}"#;
    let input = write_file(dir.path(), "days.json", days).unwrap();

    trip_metrics(&dir)
        .args(["dashboard", "--imperial", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Metrics Dashboard"))
        .stdout(predicate::str::contains("mi"));
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    trip_metrics(&dir)
        .args(["summary", "--input", "missing.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read timeline file"));
}

#[test]
fn test_bad_date_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_file(dir.path(), "trips.jsonl", &trips_jsonl("2024-05-01", 3)).unwrap();
    trip_metrics(&dir)
        .args(["summary", "--end", "05/12/2024", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid end date format"));
}

#[test]
fn test_unknown_metric_is_rejected() {
    let dir = TempDir::new().unwrap();
    trip_metrics(&dir)
        .args(["chart", "--metric", "calories", "--input", "trips.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown metric"));
}
