// SPDX-License-Identifier: MIT

//! Engine-wide configuration knobs (§6 "Configuration knobs").
//!
//! Collected in one place so the daemon can load a single TOML file at
//! startup and pass the same `Config` into every component's constructor,
//! mirroring the teacher's single `oj.toml` load.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All configuration knobs enumerated in spec.md §6, with defaults matching
/// the stated values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between heartbeat ticks.
    pub heartbeat_interval_secs: u64,
    /// Max number of tasks allowed in `executing` at once.
    pub max_concurrent_tasks: usize,
    /// Minimum seconds between rate-limit probes.
    pub probe_interval_secs: u64,
    /// Timeout for a single probe invocation.
    pub probe_timeout_secs: u64,
    /// Default per-session subprocess timeout.
    pub default_session_timeout_secs: u64,
    /// Directory under which project clones live.
    pub repos_dir: PathBuf,
    /// Directory under which task worktrees live.
    pub worktrees_dir: PathBuf,
    /// Working directory used for tasks with no project.
    pub default_working_dir: PathBuf,
    /// Model identifier used for the batch assessment call.
    pub assessment_model: String,
    /// Grace period before force-killing a subprocess after a graceful
    /// terminate signal.
    pub terminate_grace_secs: u64,
    /// Number of beats between worktree GC sweeps.
    pub gc_every_beats: u64,
    /// Max tasks pulled into a single assessment batch.
    pub assessment_batch_size: usize,
    /// Path to the agent CLI binary.
    pub agent_cli_path: String,
    /// Path to the remote-repo ("gh"-compatible) CLI binary.
    pub gh_cli_path: String,
    /// Path to the store's snapshot file.
    pub store_path: PathBuf,
    /// Directory under which per-session stdout/stderr logs live.
    pub sessions_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 300,
            max_concurrent_tasks: 3,
            probe_interval_secs: 300,
            probe_timeout_secs: 30,
            default_session_timeout_secs: 600,
            repos_dir: PathBuf::from("repos"),
            worktrees_dir: PathBuf::from("worktrees"),
            default_working_dir: PathBuf::from("."),
            assessment_model: "claude-haiku-4-5".to_string(),
            terminate_grace_secs: 10,
            gc_every_beats: 10,
            assessment_batch_size: 10,
            agent_cli_path: "claude".to_string(),
            gh_cli_path: "gh".to_string(),
            store_path: PathBuf::from("taskforge.json"),
            sessions_dir: PathBuf::from("sessions"),
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults for any missing key.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("parsing config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.heartbeat_interval_secs, 300);
        assert_eq!(c.probe_interval_secs, 300);
        assert_eq!(c.probe_timeout_secs, 30);
        assert_eq!(c.default_session_timeout_secs, 600);
        assert_eq!(c.gc_every_beats, 10);
        assert_eq!(c.assessment_batch_size, 10);
    }

    #[test]
    fn load_missing_file_errors() {
        let err = Config::load(std::path::Path::new("/nonexistent/taskforge.toml"));
        assert!(err.is_err());
    }
}
