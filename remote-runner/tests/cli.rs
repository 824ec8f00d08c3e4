//! CLI tests for the `remote-runner` binary.
//!
//! Spawns the binary with a controlled environment and checks exit codes and
//! the plain-text log on stdout.

#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output};

use remote_runner::core::remote::{REPO_NAME, REPO_URL, REQUIRED_VARS, SCRIPT_DIR, SCRIPT_NAME};
use remote_runner::exit_codes;
use remote_runner::test_support::LocalRemote;

fn runner(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_remote-runner"));
    cmd.current_dir(cwd)
        .arg("--interpreter")
        .arg("sh")
        .env("RUST_LOG", "info");
    for name in REQUIRED_VARS {
        cmd.env_remove(name);
    }
    cmd
}

fn run_with(cwd: &Path, url: &str, script: &str) -> Output {
    runner(cwd)
        .env(REPO_URL, url)
        .env(REPO_NAME, "checkout")
        .env(SCRIPT_DIR, "scripts")
        .env(SCRIPT_NAME, script)
        .output()
        .expect("run remote-runner")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn clone_then_pull_both_exit_ok() {
    let remote = LocalRemote::with_scripts(&[("hello.sh", "echo hello from script\n")])
        .expect("remote");
    let cwd = tempfile::tempdir().expect("cwd");

    let first = run_with(cwd.path(), &remote.url(), "hello.sh");
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let log = stdout(&first);
    assert!(log.contains("Cloning repository checkout"), "{log}");
    assert!(log.contains("Executing script: checkout/scripts/hello.sh"), "{log}");
    assert!(log.contains("hello from script"), "script stdout is inherited: {log}");

    let second = run_with(cwd.path(), &remote.url(), "hello.sh");
    assert_eq!(second.status.code(), Some(exit_codes::OK));
    assert!(stdout(&second).contains("Updating repository checkout"));
}

#[test]
fn failing_script_logs_diagnostic_and_exits_failure() {
    let remote = LocalRemote::with_scripts(&[("bad.sh", "echo 'disk on fire' >&2\nexit 3\n")])
        .expect("remote");
    let cwd = tempfile::tempdir().expect("cwd");

    let output = run_with(cwd.path(), &remote.url(), "bad.sh");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let log = stdout(&output);
    assert!(log.contains("Script Execution Failed:"), "{log}");
    assert!(log.contains("disk on fire"), "{log}");
    assert!(
        log.contains("Error executing command: command `sh bad.sh` returned non-zero exit status 3"),
        "{log}"
    );
}

#[test]
fn silent_failing_script_logs_no_details() {
    let remote = LocalRemote::with_scripts(&[("quiet.sh", "exit 1\n")]).expect("remote");
    let cwd = tempfile::tempdir().expect("cwd");

    let output = run_with(cwd.path(), &remote.url(), "quiet.sh");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(stdout(&output).contains("No additional error details available."));
}

#[test]
fn bad_remote_exits_failure_without_running_script() {
    let cwd = tempfile::tempdir().expect("cwd");
    let missing = cwd.path().join("nowhere");

    let output = run_with(cwd.path(), &missing.display().to_string(), "hello.sh");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let log = stdout(&output);
    assert!(log.contains("Error executing command: command `git clone"), "{log}");
    assert!(!log.contains("Executing script"), "{log}");
}

#[test]
fn missing_variables_take_fallback_path() {
    let cwd = tempfile::tempdir().expect("cwd");

    let output = runner(cwd.path())
        .env(REPO_NAME, "checkout")
        .env(SCRIPT_DIR, "scripts")
        .env(SCRIPT_NAME, "hello.sh")
        .output()
        .expect("run remote-runner");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let log = stdout(&output);
    assert!(log.contains("Error: Missing required environment variables"), "{log}");
    assert!(log.contains("Fallback to template handler!"), "{log}");
}

#[test]
fn invalid_settings_file_exits_failure() {
    let cwd = tempfile::tempdir().expect("cwd");
    std::fs::write(cwd.path().join("remote-runner.toml"), "interpreter = \"\"\n")
        .expect("write settings");

    let output = Command::new(env!("CARGO_BIN_EXE_remote-runner"))
        .current_dir(cwd.path())
        .env("RUST_LOG", "info")
        .output()
        .expect("run remote-runner");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(stdout(&output).contains("Unexpected error"));
}
