//! Smoke tests for the covstash CLI
//!
//! These tests verify basic CLI functionality works correctly.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the covstash binary
fn covstash() -> Command {
    let mut cmd = Command::cargo_bin("covstash").expect("covstash binary should exist");
    cmd.env_remove("COVSTASH_CWD")
        .env_remove("COVSTASH_CACHE")
        .env_remove("RUST_LOG");
    cmd
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in ["lib/a.js", "lib/b.js", "test/a.js", "node_modules/x/index.js"] {
        let path = dir.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x();\n").unwrap();
    }
    dir
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    covstash()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    covstash()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("clear-cache"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_unknown_subcommand_fails() {
    covstash().arg("bogus").assert().failure();
}

// ============================================================================
// Command Tests
// ============================================================================

#[test]
fn test_ls_lists_instrumentable_files() {
    let dir = project();
    covstash()
        .args(["ls", "--cwd"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("lib/a.js"))
        .stdout(predicate::str::contains("lib/b.js"))
        .stdout(predicate::str::contains("test/a.js").not())
        .stdout(predicate::str::contains("node_modules").not());
}

#[test]
fn test_ls_honors_config_file() {
    let dir = project();
    fs::write(dir.path().join(".covstash.yml"), "include:\n  - lib/b.js\n").unwrap();
    covstash()
        .args(["ls", "--cwd"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("lib/b.js"))
        .stdout(predicate::str::contains("lib/a.js").not());
}

#[test]
fn test_invalid_pattern_reports_error() {
    let dir = project();
    fs::write(dir.path().join(".covstash.yml"), "include:\n  - lib/[a\n").unwrap();
    covstash()
        .args(["ls", "--cwd"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid glob pattern"));
}

#[test]
fn test_report_on_empty_run() {
    let dir = project();
    covstash()
        .args(["report", "-r", "text", "--cwd"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("All files"));
}

#[test]
fn test_report_json_merges_snapshots() {
    let dir = project();
    let temp = dir.path().join(".covstash_output");
    fs::create_dir_all(&temp).unwrap();
    let snapshot = r#"{"lib/a.js":{"path":"lib/a.js","s":{"0":2},"b":{},"f":{},"statementMap":{"0":{"start":{"line":1,"column":0},"end":{"line":1,"column":4}}},"fnMap":{},"branchMap":{}}}"#;
    fs::write(temp.join("1.json"), snapshot).unwrap();
    fs::write(temp.join("2.json"), snapshot).unwrap();

    covstash()
        .args(["-q", "report", "-r", "json", "--cwd"])
        .arg(dir.path())
        .assert()
        .success();

    let merged = fs::read_to_string(dir.path().join("coverage/coverage-final.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
    assert_eq!(value["lib/a.js"]["s"]["0"], 4);
}

#[test]
fn test_clean_removes_snapshot_dir() {
    let dir = project();
    let temp = dir.path().join(".covstash_output");
    fs::create_dir_all(&temp).unwrap();
    fs::write(temp.join("1.json"), "{}").unwrap();

    covstash()
        .args(["clean", "--cwd"])
        .arg(dir.path())
        .assert()
        .success();
    assert!(!temp.exists());
}

#[test]
fn test_clear_cache_succeeds_without_cache() {
    let dir = project();
    covstash()
        .args(["clear-cache", "--cwd"])
        .arg(dir.path())
        .assert()
        .success();
}

#[cfg(unix)]
#[test]
fn test_run_propagates_exit_code() {
    let dir = project();
    covstash()
        .args(["-q", "run", "--no-report", "--cwd"])
        .arg(dir.path())
        .args(["--", "sh", "-c", "exit 7"])
        .assert()
        .code(7);
}

#[cfg(unix)]
#[test]
fn test_run_exports_environment() {
    let dir = project();
    covstash()
        .args(["-q", "--cache", "run", "--no-report", "--cwd"])
        .arg(dir.path())
        .args(["--", "sh", "-c", "test -n \"$COVSTASH_CWD\" && test \"$COVSTASH_CACHE\" = enable"])
        .assert()
        .success();
}
