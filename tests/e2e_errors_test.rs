//! E2E tests for cdkfetch error scenarios and edge cases.
//!
//! Covers:
//! - Invalid command and flag handling
//! - Missing, empty and malformed accounts files
//! - Invalid provider and unknown account selection
//! - Corrupted config behavior (structured error, no panic)
//! - Help/version output

use predicates::prelude::*;

mod common;

use common::logger::TestLogger;
use common::{Sandbox, stderr_json};

#[test]
fn invalid_command_is_rejected() {
    let log = TestLogger::new("invalid_command_is_rejected");
    let sandbox = Sandbox::new();

    log.phase("execute");
    sandbox
        .cmd()
        .arg("notacommand")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized").or(predicate::str::contains("error")));

    log.finish_ok();
}

#[test]
fn missing_accounts_file_is_a_config_error() {
    let log = TestLogger::new("missing_accounts_file_is_a_config_error");
    let sandbox = Sandbox::new();

    log.phase("execute");
    let output = sandbox.cmd().args(["acquire", "--json"]).output().unwrap();

    log.phase("verify");
    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    let error = stderr_json(&output.stderr);
    assert_eq!(error["error_code"], "CDK-C021");
    assert_eq!(error["exit_code"], 3);
    assert!(!error["suggestions"].as_array().unwrap().is_empty());

    log.finish_ok();
}

#[test]
fn bare_invocation_runs_acquire() {
    let log = TestLogger::new("bare_invocation_runs_acquire");
    let sandbox = Sandbox::new();
    sandbox.write_accounts("[]");

    let output = sandbox.cmd().arg("--json").output().unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stderr_json(&output.stderr)["error_code"], "CDK-C021");

    log.finish_ok();
}

#[test]
fn malformed_accounts_file_reports_parse_error() {
    let log = TestLogger::new("malformed_accounts_file_reports_parse_error");
    let sandbox = Sandbox::new();
    sandbox.write_accounts(r#"[{"name": "a"}, {"name": "a"}]"#);

    let output = sandbox.cmd().args(["acquire", "--json"]).output().unwrap();

    assert_eq!(output.status.code(), Some(3));
    let error = stderr_json(&output.stderr);
    assert_eq!(error["error_code"], "CDK-C002");
    assert!(error["message"].as_str().unwrap().contains("duplicate"));

    log.finish_ok();
}

#[test]
fn invalid_provider_is_rejected() {
    let log = TestLogger::new("invalid_provider_is_rejected");
    let sandbox = Sandbox::new();
    sandbox.write_accounts(&cdkfetch::test_utils::make_test_accounts_json());

    log.phase("execute");
    let output = sandbox
        .cmd()
        .args(["acquire", "--provider", "nonexistent_provider_xyz", "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let error = stderr_json(&output.stderr);
    assert_eq!(error["error_code"], "CDK-C010");
    assert!(
        error["message"]
            .as_str()
            .unwrap()
            .contains("nonexistent_provider_xyz")
    );

    log.finish_ok();
}

#[test]
fn unknown_account_is_rejected() {
    let log = TestLogger::new("unknown_account_is_rejected");
    let sandbox = Sandbox::new();
    sandbox.write_accounts(&cdkfetch::test_utils::make_test_accounts_json());

    let output = sandbox
        .cmd()
        .args(["acquire", "--account", "ghost", "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stderr_json(&output.stderr)["error_code"], "CDK-C020");

    log.finish_ok();
}

#[test]
fn zero_timeout_is_rejected() {
    let log = TestLogger::new("zero_timeout_is_rejected");
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["acquire", "--timeout", "0"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Timeout must be greater than 0"));

    log.finish_ok();
}

#[test]
fn human_errors_are_plain_without_a_terminal() {
    let log = TestLogger::new("human_errors_are_plain_without_a_terminal");
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .arg("acquire")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Error [CDK-C021]: no accounts configured"))
        .stderr(predicate::str::contains("\x1b[").not());

    log.finish_ok();
}

#[test]
fn corrupted_config_does_not_panic() {
    let log = TestLogger::new("corrupted_config_does_not_panic");
    let sandbox = Sandbox::new();

    log.phase("setup");
    sandbox.write_config("this is not valid toml {{{{");
    sandbox.write_accounts(&cdkfetch::test_utils::make_test_accounts_json());

    log.phase("execute");
    let output = sandbox.cmd().args(["providers", "--json"]).output().unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.to_lowercase().contains("panic"),
        "Should not panic on corrupted config"
    );
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stderr_json(&output.stderr)["error_code"], "CDK-C002");

    log.finish_ok();
}

#[test]
fn invalid_config_values_are_rejected() {
    let log = TestLogger::new("invalid_config_values_are_rejected");
    let sandbox = Sandbox::new();
    sandbox.write_config("[providers]\ndefault_providers = [\"nope\"]\n");

    let output = sandbox.cmd().args(["providers", "--json"]).output().unwrap();

    assert_eq!(output.status.code(), Some(3));
    let error = stderr_json(&output.stderr);
    assert_eq!(error["error_code"], "CDK-C004");
    assert!(error["message"].as_str().unwrap().contains("nope"));

    log.finish_ok();
}

#[test]
fn help_exits_zero() {
    let log = TestLogger::new("help_exits_zero");

    Sandbox::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("acquire"));

    log.finish_ok();
}

#[test]
fn version_format_is_valid() {
    let log = TestLogger::new("version_format_is_valid");

    Sandbox::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"cdkfetch \d+\.\d+\.\d+").unwrap());

    log.finish_ok();
}
