// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests for the `bbs-cli` binary that don't need a running daemon.

use assert_cmd::Command;
use predicates::str::contains;

fn bbs_cli() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("bbs-cli").expect("binary `bbs-cli` should be built")
}

#[test]
fn help_flag_prints_usage() {
    bbs_cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Admin client for a running bbs-daemon"))
        .stdout(contains("orchestrator"))
        .stdout(contains("job"))
        .stdout(contains("config"));
}

#[test]
fn version_flag_prints_version() {
    bbs_cli().arg("--version").assert().success().stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn config_validate_accepts_a_minimal_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bbs.toml");
    std::fs::write(&path, "store_path = \"./store.json\"\n").unwrap();

    bbs_cli()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("valid"));
}

#[test]
fn config_validate_reports_a_missing_file() {
    bbs_cli()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg("/nonexistent/bbs.toml")
        .assert()
        .failure()
        .stderr(contains("error"));
}

#[test]
fn orchestrator_status_without_user_fails_fast() {
    bbs_cli().arg("orchestrator").arg("status").assert().failure().stderr(contains("--user"));
}
