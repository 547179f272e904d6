// SPDX-License-Identifier: MIT

//! Process wiring for the scheduling engine: loads configuration, builds
//! the store/bus/probe/driver collaborators, constructs the [`Scheduler`]
//! and drives it with the [`Heartbeat`] tick loop — the in-process
//! equivalent of the teacher's `ojd` binary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod logging;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskforge_adapters::{AgentCliDriver, GitAdapter, RateLimitProbe};
use taskforge_core::{Config, SystemClock, TimeSource};
use taskforge_engine::{Assessor, CliAssessor, EventBus, Heartbeat, Scheduler, SessionManager, WorktreeManager};
use taskforge_storage::{FileStore, Store};

pub use error::DaemonError;

/// Build every collaborator named in §6/§4 from `config` and run the
/// heartbeat loop until `shutdown` is cancelled.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), DaemonError> {
    let store: Arc<dyn Store> = Arc::new(FileStore::open(&config.store_path)?);
    let clock: Arc<dyn TimeSource> = Arc::new(SystemClock);
    let bus = EventBus::new(store.clone(), clock.clone());

    let driver = AgentCliDriver::new(config.agent_cli_path.clone(), Duration::from_secs(config.terminate_grace_secs));
    let session_manager = SessionManager::new(
        store.clone(),
        driver,
        bus.clone(),
        clock.clone(),
        config.sessions_dir.clone(),
        Duration::from_secs(config.default_session_timeout_secs),
        Duration::from_secs(config.terminate_grace_secs),
    );

    let git = GitAdapter::new("git", config.gh_cli_path.clone());
    let worktrees = WorktreeManager::new(git.clone(), config.worktrees_dir.clone());

    let assessor: Arc<dyn Assessor> = Arc::new(CliAssessor::new(
        config.agent_cli_path.clone(),
        config.assessment_model.clone(),
        Duration::from_secs(config.probe_timeout_secs),
    ));

    let scheduler = Scheduler::new(
        store.clone(),
        bus.clone(),
        clock.clone(),
        session_manager,
        assessor,
        git,
        worktrees,
        config.max_concurrent_tasks,
        config.assessment_batch_size,
        config.default_working_dir.clone(),
    );

    let probe = RateLimitProbe::new(config.agent_cli_path.clone(), Duration::from_secs(config.probe_timeout_secs));
    let heartbeat = Heartbeat::new(
        scheduler,
        probe,
        store,
        bus,
        clock,
        Duration::from_secs(config.probe_interval_secs),
        config.gc_every_beats,
    );

    heartbeat.run(Duration::from_secs(config.heartbeat_interval_secs), shutdown).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_builds_every_collaborator_and_stops_on_cancel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            heartbeat_interval_secs: 0,
            store_path: dir.path().join("taskforge.json"),
            sessions_dir: dir.path().join("sessions"),
            worktrees_dir: dir.path().join("worktrees"),
            repos_dir: dir.path().join("repos"),
            ..Config::default()
        };
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), run(config, shutdown)).await;
        assert!(result.is_ok(), "run() did not stop after shutdown was cancelled");
        assert!(result.unwrap().is_ok());
    }
}
