//! Integration tests for the `lease` CLI binary.
//!
//! These only exercise argument parsing and help output — they do not
//! require a running Redis instance.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::process::Command;

fn lease_bin() -> String {
    let path = env!("CARGO_BIN_EXE_lease");
    assert!(Path::new(path).exists(), "lease binary not found at {path}");
    path.to_owned()
}

fn run(args: &[&str]) -> (i32, String, String) {
    let output = Command::new(lease_bin()).args(args).output().expect("failed to execute lease");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

#[test]
fn test_version_flag() {
    let (code, stdout, _) = run(&["--version"]);
    assert_eq!(code, 0, "lease --version should exit 0");
    assert!(stdout.contains("lease"), "version output should contain 'lease': {stdout}");
}

#[test]
fn test_help_flag() {
    let (code, stdout, _) = run(&["--help"]);
    assert_eq!(code, 0, "lease --help should exit 0");
    assert!(stdout.contains("grant"), "help should list 'grant' command");
    assert!(stdout.contains("revoke"), "help should list 'revoke' command");
    assert!(stdout.contains("ttl"), "help should list 'ttl' command");
}

#[test]
fn test_missing_args_exits_nonzero() {
    let (code, _, stderr) = run(&["grant"]);
    assert_ne!(code, 0, "grant without arguments should fail");
    assert!(!stderr.is_empty());
}

#[test]
fn test_connect_failure_reports_error() {
    let (code, _, stderr) = run(&["--redis-url", "redis://127.0.0.1:1", "lease", "ws", "missing"]);
    assert_ne!(code, 0, "unreachable redis should fail");
    assert!(stderr.contains("error"), "stderr should report the connection error: {stderr}");
}
