// SPDX-License-Identifier: MIT

//! The `Store` trait (§6). Every read/write the engine performs against
//! task/session/comment/event/project/rate-limit state goes through this
//! trait; it is the sole synchronization primitive for cross-task state
//! (§5 "shared-resource discipline").

use async_trait::async_trait;
use std::collections::HashMap;

use taskforge_core::{Comment, Event, Project, ProjectId, RateLimitStatus, Session, SessionId, Task, TaskId};

use crate::error::StoreError;

/// Filter for [`Store::list_tasks`]. `None` means "don't filter on this field".
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<taskforge_core::TaskStatus>,
    pub parent_id: Option<TaskId>,
    pub project_id: Option<ProjectId>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[async_trait]
pub trait Store: Send + Sync {
    // -- Tasks --

    /// Allocate the next monotonic `seq` for a new task (§3 "monotonic
    /// integer + opaque UUID" identity).
    async fn next_seq(&self) -> Result<u64, StoreError>;

    async fn create_task(&self, task: Task) -> Result<Task, StoreError>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Full replace of a task row. Metadata merges are the caller's
    /// responsibility (read-modify-write); see §9's non-atomic-merge note.
    async fn update_task(&self, task: Task) -> Result<Task, StoreError>;

    /// List tasks matching `filter`, ordered by `position ASC, priority DESC`.
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError>;

    /// `status=pending AND metadata.active=true AND complexity IS NULL`.
    async fn get_active_unassessed(&self, limit: usize) -> Result<Vec<Task>, StoreError>;

    /// `status=pending AND metadata.active=true AND complexity IS NOT NULL`,
    /// ordered by `position ASC, priority DESC`.
    async fn get_next_assessed(&self, limit: usize) -> Result<Vec<Task>, StoreError>;

    /// Apply a bulk `(task_id, new_position)` reorder.
    async fn reorder(&self, positions: &[(TaskId, i64)]) -> Result<(), StoreError>;

    // -- Sessions --

    async fn create_session(&self, session: Session) -> Result<Session, StoreError>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    async fn update_session(&self, session: Session) -> Result<Session, StoreError>;

    // -- Comments --

    async fn create_comment(&self, comment: Comment) -> Result<Comment, StoreError>;

    async fn list_comments(&self, task_id: &TaskId) -> Result<Vec<Comment>, StoreError>;

    /// Newest comment per task id, in one logical query.
    async fn get_latest_comments(&self, task_ids: &[TaskId]) -> Result<HashMap<TaskId, Comment>, StoreError>;

    // -- Events --

    /// Persist an event for audit. Callers (the event bus) treat failure
    /// here as non-fatal: log and continue (§4.1).
    async fn append_event(&self, event: Event) -> Result<(), StoreError>;

    /// All events recorded for one entity, in emission order.
    async fn list_events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>, StoreError>;

    // -- Projects --

    async fn create_project(&self, project: Project) -> Result<Project, StoreError>;

    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, StoreError>;

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    // -- Rate limit --

    async fn get_rate_limit_status(&self) -> Result<Option<RateLimitStatus>, StoreError>;

    /// Single-row upsert (id=1 per §6).
    async fn set_rate_limit_status(&self, status: RateLimitStatus) -> Result<(), StoreError>;
}
