// SPDX-License-Identifier: MIT

//! Scheduler Core (§4.5): the per-beat phases (dedupe, assess, execute),
//! task state transitions (launch, decompose, ready-for-review, requeue,
//! cancel) and parent/child completion propagation. The Heartbeat (in
//! [`crate::heartbeat`]) is the only caller of these phases; it owns the
//! tick loop and the rate-limit gate.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use taskforge_core::{
    Clock, Comment, CommentAuthor, EntityType, EventType, Project, ProjectId, Session, SessionStatus, Task, TaskId,
    TaskStatus, TimeSource,
};
use taskforge_storage::{Store, TaskFilter};

use taskforge_adapters::GitAdapter;

use crate::assess::{AssessmentRequest, AssessmentResult, Assessor};
use crate::bus::EventBus;
use crate::error::SchedulerError;
use crate::prompt;
use crate::session_manager::SessionManager;
use crate::time_adapter::EpochClock;
use crate::workspace::WorktreeManager;

/// Central scheduling component (§4.5). Cheaply `Clone`-able.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    bus: EventBus,
    clock: Arc<dyn TimeSource>,
    session_manager: SessionManager,
    assessor: Arc<dyn Assessor>,
    git: GitAdapter,
    worktrees: WorktreeManager,
    max_concurrent_tasks: usize,
    assessment_batch_size: usize,
    default_working_dir: PathBuf,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        bus: EventBus,
        clock: Arc<dyn TimeSource>,
        session_manager: SessionManager,
        assessor: Arc<dyn Assessor>,
        git: GitAdapter,
        worktrees: WorktreeManager,
        max_concurrent_tasks: usize,
        assessment_batch_size: usize,
        default_working_dir: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                bus,
                clock,
                session_manager,
                assessor,
                git,
                worktrees,
                max_concurrent_tasks,
                assessment_batch_size,
                default_working_dir,
            }),
        }
    }

    fn clock(&self) -> EpochClock {
        EpochClock(self.inner.clock.clone())
    }

    // -- Beat step 5: always-run deduplication --

    /// Over every pending task, keep only the lowest-position task per
    /// normalized-title key; cancel the rest as duplicates (§4.5 step 5).
    /// Returns the number of tasks cancelled.
    pub async fn dedupe_tasks(&self) -> Result<usize, SchedulerError> {
        let pending = self.inner.store.list_tasks(TaskFilter { status: Some(TaskStatus::Pending), ..Default::default() }).await?;

        let mut kept: HashMap<String, Task> = HashMap::new();
        let mut duplicates: Vec<Task> = Vec::new();
        for task in pending {
            let key = task.normalized_title();
            match kept.remove(&key) {
                Some(existing) if existing.position <= task.position => {
                    duplicates.push(task);
                    kept.insert(key, existing);
                }
                Some(existing) => {
                    duplicates.push(existing);
                    kept.insert(key, task);
                }
                None => {
                    kept.insert(key, task);
                }
            }
        }

        let clock = self.clock();
        let count = duplicates.len();
        for mut dup in duplicates {
            if dup.transition_to(TaskStatus::Cancelled, &clock) {
                dup.metadata.cancelled_reason = Some("duplicate".to_string());
                let dup = self.inner.store.update_task(dup).await?;
                self.inner
                    .bus
                    .emit(
                        EventType::task_cancelled(),
                        EntityType::Task,
                        Some(dup.id.to_string()),
                        serde_json::json!({"cancelled_reason": "duplicate"}),
                    )
                    .await;
            }
        }
        Ok(count)
    }

    // -- Assess phase --

    /// Batch-assess up to `assessment_batch_size` active+unassessed pending
    /// tasks in a single LLM call (§4.5 "Assessment phase").
    pub async fn assess_phase(&self) -> Result<usize, SchedulerError> {
        let tasks = self.inner.store.get_active_unassessed(self.inner.assessment_batch_size).await?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let requests: Vec<AssessmentRequest> =
            tasks.iter().map(|t| AssessmentRequest { id: t.id, title: t.title.clone(), description: t.description.clone() }).collect();

        let results = match self.inner.assessor.assess(&requests).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "assessment call failed, applying conservative defaults to whole batch");
                tasks.iter().map(|t| AssessmentResult::conservative_default(t.id)).collect()
            }
        };
        let mut by_id: HashMap<TaskId, AssessmentResult> = results.into_iter().map(|r| (r.id, r)).collect();

        let clock = self.clock();
        let mut applied = 0;
        for mut task in tasks {
            let result = by_id.remove(&task.id).unwrap_or_else(|| AssessmentResult::conservative_default(task.id));
            task.complexity = Some(result.complexity);
            task.recommended_model = Some(result.recommended_model);
            task.metadata.assessment = Some(result.assessment);
            task.updated_at_ms = clock.epoch_ms();
            let task = self.inner.store.update_task(task).await?;

            if let Some(comment) = result.comment {
                self.inner.store.create_comment(Comment::new(task.id, comment, CommentAuthor::System, &clock)).await?;
            }

            self.inner
                .bus
                .emit(
                    EventType::task_assessed(),
                    EntityType::Task,
                    Some(task.id.to_string()),
                    serde_json::json!({"complexity": task.complexity, "recommended_model": task.recommended_model}),
                )
                .await;
            applied += 1;
        }
        Ok(applied)
    }

    // -- Execute phase --

    /// Reconcile all `executing` tasks against their session, then fill any
    /// free slots with assessed active pending tasks (§4.5 "Execute phase").
    pub async fn execute_phase(&self) -> Result<(), SchedulerError> {
        let executing = self.inner.store.list_tasks(TaskFilter { status: Some(TaskStatus::Executing), ..Default::default() }).await?;
        for task in executing {
            let task_id = task.id;
            if let Err(e) = self.check_executing_task(task).await {
                tracing::warn!(task_id = %task_id, error = %e, "check_executing_task failed");
            }
        }

        let executing_count =
            self.inner.store.list_tasks(TaskFilter { status: Some(TaskStatus::Executing), ..Default::default() }).await?.len();
        let slots = self.inner.max_concurrent_tasks.saturating_sub(executing_count);
        if slots == 0 {
            return Ok(());
        }

        let candidates = self.inner.store.get_next_assessed(slots).await?;
        let mut set = tokio::task::JoinSet::new();
        for task in candidates {
            let scheduler = self.clone();
            set.spawn(async move { scheduler.handle_assessed_task(task).await });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "launching assessed task failed"),
                Err(e) => tracing::warn!(error = %e, "launch task panicked"),
            }
        }
        Ok(())
    }

    async fn handle_assessed_task(&self, task: Task) -> Result<(), SchedulerError> {
        let should_decompose =
            task.metadata.decompose_on_heartbeat || task.metadata.assessment.as_ref().is_some_and(|a| a.should_decompose);
        if should_decompose {
            self.decompose(task).await
        } else {
            self.launch(task).await
        }
    }

    /// Split `parent` into one child task per recorded subtask, positioned
    /// just before the parent so they run first; mark the parent
    /// `decomposed` (§4.5 execute phase, decompose branch).
    async fn decompose(&self, mut parent: Task) -> Result<(), SchedulerError> {
        let subtasks = parent.metadata.assessment.as_ref().map(|a| a.subtasks.clone()).unwrap_or_default();
        self.inner
            .bus
            .emit(
                EventType::task_needs_decomposition(),
                EntityType::Task,
                Some(parent.id.to_string()),
                serde_json::json!({"subtasks": subtasks}),
            )
            .await;

        let clock = self.clock();
        let n = subtasks.len() as i64;
        let mut created_ids = Vec::with_capacity(subtasks.len());
        for (i, title) in subtasks.into_iter().enumerate() {
            let seq = self.inner.store.next_seq().await?;
            let mut child = Task::new(title, String::new(), seq, &clock);
            child.parent_task_id = Some(parent.id);
            child.project_id = parent.project_id.clone();
            child.priority = parent.priority;
            child.position = parent.position - (n - i as i64);
            child.metadata.active = true;
            let child = self.inner.store.create_task(child).await?;
            self.inner
                .bus
                .emit(
                    EventType::task_created(),
                    EntityType::Task,
                    Some(child.id.to_string()),
                    serde_json::json!({"parent_task_id": parent.id.to_string()}),
                )
                .await;
            created_ids.push(child.id);
        }

        parent.transition_to(TaskStatus::Decomposed, &clock);
        parent.metadata.decomposed_into = created_ids;
        self.inner.store.update_task(parent).await?;
        Ok(())
    }

    /// Flip `task` to `executing`, carve out a worktree if it belongs to a
    /// git-backed project, create a Session, and start it (§4.5 execute
    /// phase, launch branch).
    async fn launch(&self, mut task: Task) -> Result<(), SchedulerError> {
        let clock = self.clock();
        let project = self.project_for(&task).await?;

        let (working_dir, branch, worktree_path, repo_dir) = match &project {
            Some(p) if p.has_git_repo() => match self.inner.worktrees.create(p, &task.seq.to_string(), &task.title).await {
                Some(wt) => {
                    let path = wt.path.clone();
                    (path.clone(), Some(wt.branch), Some(path.display().to_string()), Some(p.local_dir.display().to_string()))
                }
                None => (p.local_dir.clone(), None, None, None),
            },
            Some(p) => (p.local_dir.clone(), None, None, None),
            None => (self.inner.default_working_dir.clone(), None, None, None),
        };

        task.transition_to(TaskStatus::Executing, &clock);
        task.metadata.branch = branch;
        task.metadata.worktree_path = worktree_path;
        task.metadata.repo_dir = repo_dir;
        let task = self.inner.store.update_task(task).await?;
        self.inner
            .bus
            .emit(
                EventType::task_executing(),
                EntityType::Task,
                Some(task.id.to_string()),
                serde_json::json!({"branch": task.metadata.branch, "working_dir": working_dir.display().to_string()}),
            )
            .await;

        let comments = self.inner.store.list_comments(&task.id).await?;
        let prompt_text = prompt::build_launch_prompt(&task, &comments);
        let model = task.recommended_model.clone().unwrap_or_else(|| "sonnet".to_string());
        let session = self.inner.session_manager.create_session(task.id, working_dir, model).await?;

        let mut task = task;
        task.active_session_id = Some(session.id);
        self.inner.store.update_task(task).await?;

        self.inner.session_manager.start_session(session.id, prompt_text).await?;
        Ok(())
    }

    // -- Reconciling running tasks --

    async fn check_executing_task(&self, task: Task) -> Result<(), SchedulerError> {
        let Some(session_id) = task.active_session_id else { return Ok(()) };
        let Some(session) = self.inner.store.get_session(&session_id).await? else { return Ok(()) };
        match session.status {
            SessionStatus::Completed => self.mark_task_ready_for_review(task, &session).await,
            SessionStatus::Failed => {
                let error = session
                    .exit_code
                    .map(|code| format!("session exited with code {code}"))
                    .unwrap_or_else(|| "session failed".to_string());
                self.mark_task_failed(task, error).await
            }
            SessionStatus::Cancelled => self.finish_cancelled_task(task).await,
            SessionStatus::Created | SessionStatus::Running => Ok(()),
        }
    }

    /// §4.5 `mark_task_ready_for_review`.
    async fn mark_task_ready_for_review(&self, mut task: Task, session: &Session) -> Result<(), SchedulerError> {
        let clock = self.clock();
        task.transition_to(TaskStatus::ReadyForReview, &clock);
        let mut task = self.inner.store.update_task(task).await?;
        self.inner
            .bus
            .emit(
                EventType::task_ready_for_review(),
                EntityType::Task,
                Some(task.id.to_string()),
                serde_json::json!({"exit_code": session.exit_code}),
            )
            .await;

        let stdout = tokio::fs::read_to_string(&session.stdout_path).await.unwrap_or_default();
        let mut review_comment = prompt::extract_review_comment(&stdout);

        if let (Some(branch), Some(worktree_path)) = (task.metadata.branch.clone(), task.metadata.worktree_path.clone()) {
            if let Some(project) = self.project_for(&task).await? {
                if project.has_git_repo() {
                    let wt_path = PathBuf::from(&worktree_path);
                    match self.open_pr(&project, &wt_path, &branch, &task, &review_comment).await {
                        Ok(pr_url) => {
                            review_comment.push_str(&format!("\n\nPR: {pr_url}"));
                            task.metadata.pr_url = Some(pr_url);
                            self.inner.worktrees.remove(&project, &wt_path).await;
                        }
                        Err(e) => {
                            tracing::warn!(task_id = %task.id, error = %e, "failed to open PR for reviewed task");
                        }
                    }
                }
            }
        }
        let task = self.inner.store.update_task(task).await?;

        self.inner
            .store
            .create_comment(Comment::new(task.id, review_comment, CommentAuthor::System, &clock))
            .await?;

        if let Some(parent_id) = task.parent_task_id {
            self.check_parent_completion(parent_id).await?;
        }
        Ok(())
    }

    async fn open_pr(
        &self,
        project: &Project,
        worktree_dir: &std::path::Path,
        branch: &str,
        task: &Task,
        review_comment: &str,
    ) -> Result<String, taskforge_adapters::GitError> {
        let title = format!("Task #{}: {}", task.seq, task.title);
        self.inner.git.commit_all(worktree_dir, &title).await?;
        self.inner.git.push(worktree_dir, branch).await?;
        let repo_handle = project.remote_repo.as_deref().unwrap_or_default();
        let body = prompt::truncate_pr_body(review_comment, 65_000);
        self.inner.git.create_pr(worktree_dir, repo_handle, branch, &project.default_branch, &title, &body).await
    }

    /// §4.5 `mark_task_failed`: clean up the worktree/branch, requeue to
    /// `pending` with `retry_count` incremented. Tasks auto-retry
    /// indefinitely from the scheduler's perspective (§4.5, §7 policy 3).
    async fn mark_task_failed(&self, mut task: Task, error: String) -> Result<(), SchedulerError> {
        self.remove_worktree_if_any(&task).await?;

        let clock = self.clock();
        task.transition_to(TaskStatus::Failed, &clock);
        task.transition_to(TaskStatus::Pending, &clock);
        task.completed_at_ms = None;
        task.active_session_id = None;
        task.metadata.retry_count += 1;
        task.metadata.error = Some(error.clone());
        task.metadata.last_failure = Some(clock.epoch_ms());
        task.metadata.branch = None;
        task.metadata.worktree_path = None;
        task.metadata.repo_dir = None;
        let task = self.inner.store.update_task(task).await?;

        self.inner
            .bus
            .emit(
                EventType::task_requeued(),
                EntityType::Task,
                Some(task.id.to_string()),
                serde_json::json!({"error": error, "retry_count": task.metadata.retry_count}),
            )
            .await;

        if let Some(parent_id) = task.parent_task_id {
            self.check_parent_completion(parent_id).await?;
        }
        Ok(())
    }

    async fn finish_cancelled_task(&self, mut task: Task) -> Result<(), SchedulerError> {
        let clock = self.clock();
        if task.transition_to(TaskStatus::Cancelled, &clock) {
            task.active_session_id = None;
            let task = self.inner.store.update_task(task).await?;
            self.inner
                .bus
                .emit(EventType::task_cancelled(), EntityType::Task, Some(task.id.to_string()), serde_json::json!({}))
                .await;
        }
        Ok(())
    }

    /// §4.5 `_check_parent_completion`: once every child of a `decomposed`
    /// parent reaches a terminal-or-review state, propagate the aggregate
    /// outcome to the parent. This assignment is deliberately out-of-band
    /// from [`TaskStatus::can_transition_to`] (children drive it, not a
    /// direct caller transition — see the DAG's comment on `Decomposed`).
    async fn check_parent_completion(&self, parent_id: TaskId) -> Result<(), SchedulerError> {
        let Some(mut parent) = self.inner.store.get_task(&parent_id).await? else { return Ok(()) };
        if parent.status != TaskStatus::Decomposed {
            return Ok(());
        }
        let children = self.inner.store.list_tasks(TaskFilter { parent_id: Some(parent_id), ..Default::default() }).await?;
        if children.is_empty() {
            return Ok(());
        }
        let is_settled = |s: TaskStatus| {
            matches!(s, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::ReadyForReview)
        };
        if !children.iter().all(|c| is_settled(c.status)) {
            return Ok(());
        }

        let new_status = if children.iter().any(|c| c.status == TaskStatus::Failed) {
            TaskStatus::Failed
        } else if children.iter().any(|c| c.status == TaskStatus::ReadyForReview) {
            TaskStatus::ReadyForReview
        } else {
            TaskStatus::Completed
        };

        let now = self.inner.clock.epoch_ms();
        parent.status = new_status;
        parent.updated_at_ms = now;
        if matches!(new_status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled) {
            parent.completed_at_ms = Some(now);
        }
        let parent = self.inner.store.update_task(parent).await?;

        let event_type = match new_status {
            TaskStatus::Completed => EventType::task_completed(),
            TaskStatus::Failed => EventType::task_failed(),
            TaskStatus::ReadyForReview => EventType::task_ready_for_review(),
            _ => unreachable!("new_status is one of the three matched above"),
        };
        self.inner.bus.emit(event_type, EntityType::Task, Some(parent.id.to_string()), serde_json::json!({})).await;
        Ok(())
    }

    /// Cancel a task: terminates its session (if any), cleans up its
    /// worktree/branch, sets it cancelled (§4.5 `cancel_task`).
    pub async fn cancel_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        let Some(mut task) = self.inner.store.get_task(&id).await? else { return Err(SchedulerError::NoSuchTask(id)) };

        if let Some(session_id) = task.active_session_id {
            if let Err(e) = self.inner.session_manager.cancel_session(session_id).await {
                tracing::warn!(task_id = %id, error = %e, "failed to cancel session for cancelled task");
            }
        }
        self.remove_worktree_if_any(&task).await?;

        let clock = self.clock();
        if task.transition_to(TaskStatus::Cancelled, &clock) {
            task.active_session_id = None;
            let task = self.inner.store.update_task(task).await?;
            self.inner
                .bus
                .emit(EventType::task_cancelled(), EntityType::Task, Some(task.id.to_string()), serde_json::json!({}))
                .await;
        }
        Ok(())
    }

    async fn remove_worktree_if_any(&self, task: &Task) -> Result<(), SchedulerError> {
        if let (Some(branch), Some(worktree_path)) = (&task.metadata.branch, &task.metadata.worktree_path) {
            if let Some(project) = self.project_for(task).await? {
                let wt_path = PathBuf::from(worktree_path);
                self.inner.worktrees.remove(&project, &wt_path).await;
                self.inner.worktrees.delete_branch(&project, branch).await;
            }
        }
        Ok(())
    }

    async fn project_for(&self, task: &Task) -> Result<Option<Project>, SchedulerError> {
        match &task.project_id {
            Some(pid) => Ok(self.inner.store.get_project(&ProjectId::from_string(pid)).await?),
            None => Ok(None),
        }
    }

    // -- Beat step 7: periodic worktree GC --

    /// Remove every worktree, across every git-backed project, whose
    /// branch isn't held by a non-terminal task (§4.5 step 7, §4.6 `gc`).
    pub async fn cleanup_stale_worktrees(&self) -> Result<(), SchedulerError> {
        let projects = self.inner.store.list_projects().await?;
        for project in projects {
            if !project.has_git_repo() {
                continue;
            }
            let project_tasks =
                self.inner.store.list_tasks(TaskFilter { project_id: Some(project.id), ..Default::default() }).await?;
            let active_branches: HashSet<String> = project_tasks
                .iter()
                .filter(|t| !t.status.is_terminal())
                .filter_map(|t| t.metadata.branch.clone())
                .collect();
            self.inner.worktrees.gc(&project, &active_branches).await;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
