//! Shared test fixtures for the CLI integration specs.

use std::path::PathBuf;

use assert_cmd::Command;

/// A tempdir-scoped `taskforge.json` store, so each test runs against its
/// own isolated snapshot file.
pub struct Store {
    _dir: tempfile::TempDir,
    pub path: PathBuf,
}

impl Store {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("taskforge.json");
        Self { _dir: dir, path }
    }

    /// A `taskforge` subcommand pre-wired with `--store <this snapshot>`.
    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("taskforge").expect("taskforge binary");
        cmd.arg("--store").arg(&self.path);
        cmd
    }
}

/// A bare `taskforge` invocation with no `--store` flag (for `--help`/`--version`).
pub fn cli() -> Command {
    Command::cargo_bin("taskforge").expect("taskforge binary")
}

pub fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
