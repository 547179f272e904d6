// SPDX-License-Identifier: MIT

//! Task identifier, status, metadata and state machine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::Clock;

crate::define_id! {
    /// Unique identifier for a task.
    ///
    /// Every task also carries a monotonic `seq` (assigned by the store on
    /// insert) alongside this opaque id, per the "monotonic integer + opaque
    /// UUID" identity spec.
    #[derive(Default)]
    pub struct TaskId("tsk-");
}

/// Status of a task. Transitions are a strict DAG (see [`TaskStatus::can_transition_to`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    /// Carried forward per spec's open question: the assessment phase never
    /// actually transitions tasks into this state (they remain `Pending`
    /// while being assessed). Kept in the enum for spec fidelity.
    Assessing,
    Executing,
    Decomposed,
    ReadyForReview,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Assessing => "assessing",
        Executing => "executing",
        Decomposed => "decomposed",
        ReadyForReview => "ready_for_review",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    /// True if this status never transitions further.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Validate a transition against the DAG in spec.md §3.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, Assessing | Executing | Decomposed | Cancelled) => true,
            (Executing, ReadyForReview | Failed | Cancelled) => true,
            (ReadyForReview, Pending | Completed | Failed | Cancelled) => true,
            (Failed, Pending) => true,
            // decomposed/completed/cancelled are terminal for this transition's
            // purposes (children drive parent completion out of band).
            _ => false,
        }
    }
}

/// Triage complexity assigned by the assessment LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

crate::simple_display! {
    Complexity {
        Simple => "simple",
        Medium => "medium",
        Complex => "complex",
    }
}

/// Assessment result recorded on `metadata.assessment`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<String>,
    #[serde(default)]
    pub should_decompose: bool,
}

/// Free-form task metadata: named fields the scheduler understands plus an
/// `extra` catch-all map for forward compatibility (per design note on
/// dynamic JSON payloads).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Assessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_dir: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<u64>,
    #[serde(default)]
    pub decompose_on_heartbeat: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decomposed_into: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_reason: Option<String>,
    /// Unknown keys round-trip through here instead of being dropped.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A unit of work queued for an agent session to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Monotonic position in the store's insertion order.
    pub seq: u64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: i32,
    /// Manual ordering key; lower sorts first.
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_session_id: Option<crate::session::SessionId>,
    #[serde(default)]
    pub metadata: TaskMetadata,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl Task {
    /// Create a new, active, unassessed pending task.
    pub fn new(title: impl Into<String>, description: impl Into<String>, seq: u64, clock: &impl Clock) -> Self {
        let now = clock.epoch_ms();
        Self {
            id: TaskId::new(),
            seq,
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority: 0,
            position: seq as i64,
            parent_task_id: None,
            project_id: None,
            complexity: None,
            recommended_model: None,
            active_session_id: None,
            metadata: TaskMetadata { active: true, ..Default::default() },
            created_at_ms: now,
            updated_at_ms: now,
            completed_at_ms: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.metadata.active
    }

    pub fn is_assessed(&self) -> bool {
        self.complexity.is_some()
    }

    pub fn normalized_title(&self) -> String {
        self.title.trim().to_lowercase()
    }

    /// Validated transition. Returns `false` (no-op) if the transition is invalid.
    #[must_use]
    pub fn transition_to(&mut self, next: TaskStatus, clock: &impl Clock) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at_ms = clock.epoch_ms();
        if matches!(next, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled) {
            self.completed_at_ms = Some(self.updated_at_ms);
        }
        true
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            title: String = "test task",
            description: String = "a task for tests",
        }
        set {
            seq: u64 = 1,
            status: TaskStatus = TaskStatus::Pending,
            priority: i32 = 0,
            position: i64 = 1,
            complexity: Option<Complexity> = None,
            recommended_model: Option<String> = None,
            active_session_id: Option<crate::session::SessionId> = None,
            metadata: TaskMetadata = TaskMetadata { active: true, ..TaskMetadata::test_default() },
            created_at_ms: u64 = 0,
            updated_at_ms: u64 = 0,
            completed_at_ms: Option<u64> = None,
        }
        option {
            parent_task_id: TaskId = None,
            project_id: String = None,
        }
        computed {
            id: TaskId = TaskId::new(),
        }
    }
}

impl TaskMetadata {
    #[cfg(any(test, feature = "test-support"))]
    fn test_default() -> Self {
        Self {
            active: false,
            assessment: None,
            branch: None,
            worktree_path: None,
            repo_dir: None,
            retry_count: 0,
            error: None,
            last_failure: None,
            decompose_on_heartbeat: false,
            decomposed_into: Vec::new(),
            pr_url: None,
            cancelled_reason: None,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
