//! End-to-end tests of the `gridsec` binary on the triangle case

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn case_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/triangle.json")
}

fn post_results(report: &PathBuf) -> Vec<Value> {
    let text = fs::read_to_string(report).unwrap();
    let json: Value = serde_json::from_str(&text).unwrap();
    json["post_contingency_results"].as_array().unwrap().clone()
}

/// Default run: N-1 over every branch, ASCII report on stdout
#[test]
fn test_security_analysis_ascii_report() {
    let mut cmd = cargo_bin_cmd!("gridsec");
    cmd.args(["security-analysis", case_path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pre-contingency violations:"))
        .stdout(predicate::str::contains("L13"))
        .stdout(predicate::str::contains("10'"));
}

/// JSON report written to a file holds one result per contingency
#[test]
fn test_security_analysis_json_report() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("reports/result.json");

    let mut cmd = cargo_bin_cmd!("gridsec");
    cmd.args([
        "security-analysis",
        case_path().to_str().unwrap(),
        "--output-format",
        "json",
        "--output-file",
        out.to_str().unwrap(),
        "--threads",
        "2",
    ])
    .assert()
    .success();

    let posts = post_results(&out);
    assert_eq!(posts.len(), 3);
    let ids: Vec<&str> = posts
        .iter()
        .map(|p| p["contingency_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["L12", "L23", "L13"]);
    let l13 = &posts[2];
    assert_eq!(l13["status"], "CONVERGED");
    let violations = l13["limit_violations_result"]["limit_violations"]
        .as_array()
        .unwrap();
    assert!(!violations.is_empty());
    for violation in violations {
        assert_eq!(violation["subject_id"], "L12");
        assert_eq!(violation["limit_name"], "10'");
        assert_eq!(violation["acceptable_duration"], 600);
    }
}

/// --task keeps only its slice of the contingency list
#[test]
fn test_security_analysis_task_slice() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("slice.json");

    let mut cmd = cargo_bin_cmd!("gridsec");
    cmd.args([
        "security-analysis",
        case_path().to_str().unwrap(),
        "--task",
        "3/3",
        "--output-format",
        "json",
        "--output-file",
        out.to_str().unwrap(),
    ])
    .assert()
    .success();

    let posts = post_results(&out);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["contingency_id"], "L13");
}

/// Generated N-1 list feeds back into the analysis
#[test]
fn test_generated_contingency_list_round_trip() {
    let tmp = tempdir().unwrap();
    let list = tmp.path().join("n1.yaml");
    let out = tmp.path().join("result.json");

    let mut generate = cargo_bin_cmd!("gridsec");
    generate
        .args([
            "contingencies",
            "n1",
            case_path().to_str().unwrap(),
            "--out",
            list.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 contingencies"));
    assert!(list.exists());

    let mut cmd = cargo_bin_cmd!("gridsec");
    cmd.args([
        "security-analysis",
        case_path().to_str().unwrap(),
        "--contingencies",
        list.to_str().unwrap(),
        "--output-format",
        "json",
        "--output-file",
        out.to_str().unwrap(),
    ])
    .assert()
    .success();
    assert_eq!(post_results(&out).len(), 3);
}

/// A base case that does not converge exits with code 2
#[test]
fn test_base_case_failure_exit_code() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("gridsec.toml");
    fs::write(&config, "[load_flow]\nmax_iterations = 1\n").unwrap();

    let mut cmd = cargo_bin_cmd!("gridsec");
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "security-analysis",
        case_path().to_str().unwrap(),
    ])
    .assert()
    .code(2)
    .stdout(predicate::str::contains("computation failed"));
}

/// check-limits reports the base case only
#[test]
fn test_check_limits() {
    let mut cmd = cargo_bin_cmd!("gridsec");
    cmd.args([
        "check-limits",
        case_path().to_str().unwrap(),
        "--limit-reduction",
        "0.5",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Post-contingency results: 0 of 0"));
}

/// Invalid configuration is rejected before any work starts
#[test]
fn test_invalid_config_is_rejected() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(&config, "[filter]\nviolation_types = []\n").unwrap();

    let mut cmd = cargo_bin_cmd!("gridsec");
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "check-limits",
        case_path().to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("filter"));
}

/// Missing case file fails with a readable message
#[test]
fn test_missing_case_file() {
    let mut cmd = cargo_bin_cmd!("gridsec");
    cmd.args(["security-analysis", "/nonexistent/case.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading network case"));
}
