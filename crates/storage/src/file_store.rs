// SPDX-License-Identifier: MIT

//! JSON-snapshot-backed reference implementation of [`Store`].
//!
//! State lives in one `parking_lot::Mutex<StoreState>` (never held across an
//! `.await`, per §5) and is fsynced to a single file on every mutating call,
//! the same "one state tree, one lock, snapshot on write" shape as the
//! teacher's `MaterializedState`.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use taskforge_core::{
    Comment, CommentId, Event, Project, ProjectId, RateLimitStatus, Session, SessionId, Task, TaskId, TaskStatus,
};

use crate::error::StoreError;
use crate::store::{Store, TaskFilter};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    tasks: IndexMap<TaskId, Task>,
    sessions: IndexMap<SessionId, Session>,
    comments: IndexMap<CommentId, Comment>,
    events: Vec<Event>,
    projects: IndexMap<ProjectId, Project>,
    rate_limit: Option<RateLimitStatus>,
    #[serde(default)]
    next_seq: u64,
}

/// A single-file JSON snapshot store guarded by one mutex.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open (or create) the snapshot at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| StoreError::Read(path.clone(), e))?;
            if text.trim().is_empty() {
                StoreState::default()
            } else {
                serde_json::from_str(&text).map_err(|e| StoreError::Decode(path.clone(), e))?
            }
        } else {
            StoreState::default()
        };
        Ok(Self { path, state: Mutex::new(state) })
    }

    /// In-memory store that never touches disk (for scheduler unit tests).
    pub fn in_memory() -> Self {
        Self { path: PathBuf::new(), state: Mutex::new(StoreState::default()) }
    }

    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let json = serde_json::to_vec_pretty(state).map_err(StoreError::Encode)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut f = File::create(&tmp).map_err(|e| StoreError::Write(tmp.clone(), e))?;
            f.write_all(&json).map_err(|e| StoreError::Write(tmp.clone(), e))?;
            f.sync_all().map_err(|e| StoreError::Write(tmp.clone(), e))?;
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Write(self.path.clone(), e))?;
        Ok(())
    }

    fn sorted_tasks(tasks: impl Iterator<Item = Task>) -> Vec<Task> {
        let mut v: Vec<Task> = tasks.collect();
        v.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| b.priority.cmp(&a.priority)));
        v
    }
}

#[async_trait]
impl Store for FileStore {
    async fn next_seq(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        self.persist(&state)?;
        Ok(seq)
    }

    async fn create_task(&self, task: Task) -> Result<Task, StoreError> {
        let mut state = self.state.lock();
        state.tasks.insert(task.id, task.clone());
        self.persist(&state)?;
        Ok(task)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.state.lock().tasks.get(id).cloned())
    }

    async fn update_task(&self, task: Task) -> Result<Task, StoreError> {
        let mut state = self.state.lock();
        if !state.tasks.contains_key(&task.id) {
            return Err(StoreError::NoSuchTask(task.id.to_string()));
        }
        state.tasks.insert(task.id, task.clone());
        self.persist(&state)?;
        Ok(task)
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock();
        let mut matching = Self::sorted_tasks(state.tasks.values().cloned().filter(|t| {
            filter.status.map_or(true, |s| t.status == s)
                && filter.parent_id.as_ref().map_or(true, |p| t.parent_task_id.as_ref() == Some(p))
                && filter.project_id.as_ref().map_or(true, |p| t.project_id.as_deref() == Some(p.as_str()))
        }));
        if filter.offset > 0 {
            matching = matching.into_iter().skip(filter.offset).collect();
        }
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn get_active_unassessed(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock();
        let mut tasks = Self::sorted_tasks(
            state
                .tasks
                .values()
                .cloned()
                .filter(|t| t.status == TaskStatus::Pending && t.is_active() && t.complexity.is_none()),
        );
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn get_next_assessed(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock();
        let mut tasks = Self::sorted_tasks(
            state
                .tasks
                .values()
                .cloned()
                .filter(|t| t.status == TaskStatus::Pending && t.is_active() && t.complexity.is_some()),
        );
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn reorder(&self, positions: &[(TaskId, i64)]) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        for (id, pos) in positions {
            if let Some(task) = state.tasks.get_mut(id) {
                task.position = *pos;
            }
        }
        self.persist(&state)?;
        Ok(())
    }

    async fn create_session(&self, session: Session) -> Result<Session, StoreError> {
        let mut state = self.state.lock();
        state.sessions.insert(session.id, session.clone());
        self.persist(&state)?;
        Ok(session)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.state.lock().sessions.get(id).cloned())
    }

    async fn update_session(&self, session: Session) -> Result<Session, StoreError> {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(&session.id) {
            return Err(StoreError::NoSuchSession(session.id.to_string()));
        }
        state.sessions.insert(session.id, session.clone());
        self.persist(&state)?;
        Ok(session)
    }

    async fn create_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
        let mut state = self.state.lock();
        state.comments.insert(comment.id, comment.clone());
        self.persist(&state)?;
        Ok(comment)
    }

    async fn list_comments(&self, task_id: &TaskId) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.lock();
        let mut comments: Vec<Comment> =
            state.comments.values().filter(|c| &c.task_id == task_id).cloned().collect();
        comments.sort_by_key(|c| c.created_at_ms);
        Ok(comments)
    }

    async fn get_latest_comments(&self, task_ids: &[TaskId]) -> Result<HashMap<TaskId, Comment>, StoreError> {
        let state = self.state.lock();
        let mut latest: HashMap<TaskId, Comment> = HashMap::new();
        for c in state.comments.values() {
            if !task_ids.contains(&c.task_id) {
                continue;
            }
            latest
                .entry(c.task_id)
                .and_modify(|existing| {
                    if c.created_at_ms > existing.created_at_ms {
                        *existing = c.clone();
                    }
                })
                .or_insert_with(|| c.clone());
        }
        Ok(latest)
    }

    async fn append_event(&self, event: Event) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.events.push(event);
        self.persist(&state)?;
        Ok(())
    }

    async fn list_events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .events
            .iter()
            .filter(|e| e.entity_type.to_string() == entity_type && e.entity_id.as_deref() == Some(entity_id))
            .cloned()
            .collect())
    }

    async fn create_project(&self, project: Project) -> Result<Project, StoreError> {
        let mut state = self.state.lock();
        state.projects.insert(project.id, project.clone());
        self.persist(&state)?;
        Ok(project)
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.state.lock().projects.get(id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.state.lock().projects.values().cloned().collect())
    }

    async fn get_rate_limit_status(&self) -> Result<Option<RateLimitStatus>, StoreError> {
        Ok(self.state.lock().rate_limit.clone())
    }

    async fn set_rate_limit_status(&self, status: RateLimitStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.rate_limit = Some(status);
        self.persist(&state)?;
        Ok(())
    }
}

/// Helper for tests/daemon wiring: resolve and create the parent dir if needed.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::{Clock, FakeClock, SystemClock};

    fn task(clock: &impl Clock, seq: u64) -> Task {
        Task::new("title", "desc", seq, clock)
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let store = FileStore::in_memory();
        let clock = FakeClock::new();
        let t = task(&clock, 1);
        let created = store.create_task(t.clone()).await.unwrap();
        let fetched = store.get_task(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, t.id);
    }

    #[tokio::test]
    async fn list_tasks_orders_by_position_then_priority_desc() {
        let store = FileStore::in_memory();
        let clock = FakeClock::new();
        let mut a = task(&clock, 1);
        a.position = 2;
        a.priority = 0;
        let mut b = task(&clock, 2);
        b.position = 1;
        b.priority = 5;
        let mut c = task(&clock, 3);
        c.position = 1;
        c.priority = 10;
        store.create_task(a.clone()).await.unwrap();
        store.create_task(b.clone()).await.unwrap();
        store.create_task(c.clone()).await.unwrap();

        let listed = store.list_tasks(TaskFilter::default()).await.unwrap();
        assert_eq!(listed[0].id, c.id);
        assert_eq!(listed[1].id, b.id);
        assert_eq!(listed[2].id, a.id);
    }

    #[tokio::test]
    async fn get_active_unassessed_filters_correctly() {
        let store = FileStore::in_memory();
        let clock = FakeClock::new();
        let unassessed = task(&clock, 1);
        let mut assessed = task(&clock, 2);
        assessed.complexity = Some(taskforge_core::Complexity::Simple);
        let mut inactive = task(&clock, 3);
        inactive.metadata.active = false;
        store.create_task(unassessed.clone()).await.unwrap();
        store.create_task(assessed).await.unwrap();
        store.create_task(inactive).await.unwrap();

        let result = store.get_active_unassessed(10).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, unassessed.id);
    }

    #[tokio::test]
    async fn get_latest_comments_picks_newest_per_task() {
        let store = FileStore::in_memory();
        let clock = FakeClock::new();
        let t = task(&clock, 1);
        store.create_task(t.clone()).await.unwrap();
        let c1 = Comment::new(t.id, "first", taskforge_core::CommentAuthor::User, &clock);
        clock.advance(std::time::Duration::from_secs(10));
        let c2 = Comment::new(t.id, "second", taskforge_core::CommentAuthor::System, &clock);
        store.create_comment(c1).await.unwrap();
        store.create_comment(c2.clone()).await.unwrap();

        let latest = store.get_latest_comments(&[t.id]).await.unwrap();
        assert_eq!(latest.get(&t.id).unwrap().id, c2.id);
    }

    #[tokio::test]
    async fn next_seq_is_monotonic() {
        let store = FileStore::in_memory();
        let a = store.next_seq().await.unwrap();
        let b = store.next_seq().await.unwrap();
        let c = store.next_seq().await.unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let clock = SystemClock;
        {
            let store = FileStore::open(&path).unwrap();
            store.create_task(task(&clock, 1)).await.unwrap();
        }
        let reopened = FileStore::open(&path).unwrap();
        let listed = reopened.list_tasks(TaskFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
