//! Integration tests for the `htfleet` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! and error handling, all without requiring a live fleet manager.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `htfleet` binary with env isolation.
///
/// Clears all `HTFLEET_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn htfleet_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("htfleet");
    cmd.env("HOME", "/tmp/htfleet-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/htfleet-cli-test-nonexistent")
        .env_remove("HTFLEET_SERVER")
        .env_remove("HTFLEET_OUTPUT")
        .env_remove("HTFLEET_INSECURE")
        .env_remove("HTFLEET_TIMEOUT");
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
    let output = htfleet_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    htfleet_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("homething")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    htfleet_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("htfleet"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    htfleet_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    htfleet_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_fish() {
    htfleet_cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = htfleet_cmd().arg("foobar").output().unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for invalid subcommand"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_devices_list_no_server() {
    let output = htfleet_cmd().args(["devices", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected usage exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("server") || text.contains("HTFLEET_SERVER"),
        "Expected error mentioning the missing server URL:\n{text}"
    );
}

#[test]
fn test_devices_list_invalid_server_url() {
    let output = htfleet_cmd()
        .args(["--server", "not a url", "devices", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected usage exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("invalid URL"),
        "Expected invalid URL error:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let output = htfleet_cmd()
        .args(["--output", "invalid", "devices", "list"])
        .output()
        .unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for invalid output format"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("invalid")
            || text.contains("possible values")
            || text.contains("valid value"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_delete_requires_confirmation_noninteractive() {
    // With a server configured but stdin not a TTY and no --yes, delete
    // must refuse before it ever touches the network.
    let output = htfleet_cmd()
        .args(["--server", "http://127.0.0.1:9", "devices", "delete", "d1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected usage exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("confirmation") || text.contains("--yes"),
        "Expected confirmation-required error:\n{text}"
    );
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_devices_subcommands_exist() {
    htfleet_cmd()
        .args(["devices", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("diag"))
                .and(predicate::str::contains("profile"))
                .and(predicate::str::contains("reboot"))
                .and(predicate::str::contains("update"))
                .and(predicate::str::contains("delete")),
        );
}

#[test]
fn test_devices_update_takes_version_argument() {
    // The positional version argument must coexist with the global
    // --version flag.
    htfleet_cmd()
        .args(["devices", "update", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<VERSION>").and(predicate::str::contains("<DEVICE>")));
}

#[test]
fn test_config_subcommands_exist() {
    htfleet_cmd()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("show")
                .and(predicate::str::contains("path"))
                .and(predicate::str::contains("init")),
        );
}

#[test]
fn test_config_show_no_config() {
    // `config show` renders defaults when no file exists.
    htfleet_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_watch_help() {
    htfleet_cmd()
        .args(["watch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--device"));
}
