//! `taskforge --help` and friends.

use crate::prelude::{cli, stdout};

#[test]
fn no_args_shows_usage_and_requires_a_subcommand() {
    let output = cli().output().expect("run taskforge");
    assert!(!output.status.success());
    assert!(stdout(&output).contains("Usage:") || String::from_utf8_lossy(&output.stderr).contains("Usage:"));
}

#[test]
fn help_shows_usage() {
    let output = cli().arg("--help").output().expect("run taskforge --help");
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn task_help_shows_subcommands() {
    let output = cli().args(["task", "--help"]).output().expect("run taskforge task --help");
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("add"));
    assert!(text.contains("list"));
    assert!(text.contains("cancel"));
}

#[test]
fn project_help_shows_subcommands() {
    let output = cli().args(["project", "--help"]).output().expect("run taskforge project --help");
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("add"));
    assert!(text.contains("list"));
}

#[test]
fn version_shows_version() {
    let output = cli().arg("--version").output().expect("run taskforge --version");
    assert!(output.status.success());
    assert!(stdout(&output).contains("0.2"));
}
