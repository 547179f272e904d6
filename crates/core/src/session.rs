// SPDX-License-Identifier: MIT

//! Session identifier, status and record.
//!
//! A session is one agent-CLI invocation for a task. `SessionId` is distinct
//! from `TaskId` — a task may accumulate several sessions across retries, but
//! only one is linked via `Task::active_session_id` at a time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clock::Clock;
use crate::task::TaskId;

crate::define_id! {
    /// Unique identifier for an agent-CLI session.
    #[derive(Default)]
    pub struct SessionId("ses-");
}

/// Lifecycle status of a session. The session manager is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    SessionStatus {
        Created => "created",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled)
    }
}

/// One agent-CLI invocation for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub task_id: TaskId,
    pub working_dir: PathBuf,
    pub model: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub num_turns: u32,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

impl Session {
    pub fn new(
        task_id: TaskId,
        working_dir: PathBuf,
        model: impl Into<String>,
        stdout_path: PathBuf,
        stderr_path: PathBuf,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: SessionId::new(),
            task_id,
            working_dir,
            model: model.into(),
            status: SessionStatus::Created,
            num_turns: 0,
            stdout_path,
            stderr_path,
            pid: None,
            exit_code: None,
            created_at_ms: clock.epoch_ms(),
            started_at_ms: None,
            finished_at_ms: None,
        }
    }
}

crate::builder! {
    pub struct SessionBuilder => Session {
        into {
            model: String = "sonnet",
            task_id: TaskId = TaskId::new(),
        }
        set {
            working_dir: PathBuf = PathBuf::from("/tmp/test"),
            status: SessionStatus = SessionStatus::Created,
            num_turns: u32 = 0,
            stdout_path: PathBuf = PathBuf::from("/tmp/test/stdout.log"),
            stderr_path: PathBuf = PathBuf::from("/tmp/test/stderr.log"),
            pid: Option<u32> = None,
            exit_code: Option<i32> = None,
            created_at_ms: u64 = 0,
            started_at_ms: Option<u64> = None,
            finished_at_ms: Option<u64> = None,
        }
        computed {
            id: SessionId = SessionId::new(),
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
