use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use taskforge_core::{Assessment, Complexity, FakeClock, Project, SessionId, Task, TaskId, TaskStatus};
use taskforge_storage::FileStore;

use super::*;
use crate::assess::{AssessError, AssessmentRequest, AssessmentResult, Assessor};

struct FixedAssessor {
    results: Vec<AssessmentResult>,
}

#[async_trait]
impl Assessor for FixedAssessor {
    async fn assess(&self, _requests: &[AssessmentRequest]) -> Result<Vec<AssessmentResult>, AssessError> {
        Ok(self.results.clone())
    }
}

struct FailingAssessor;

#[async_trait]
impl Assessor for FailingAssessor {
    async fn assess(&self, _requests: &[AssessmentRequest]) -> Result<Vec<AssessmentResult>, AssessError> {
        Err(AssessError::CliError("boom".to_string()))
    }
}

fn scheduler_with(assessor: Arc<dyn Assessor>, store: Arc<dyn Store>, clock: Arc<FakeClock>) -> (Scheduler, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let time_source: Arc<dyn TimeSource> = clock.clone();
    let bus = EventBus::new(store.clone(), time_source.clone());
    let driver = taskforge_adapters::AgentCliDriver::new("true", Duration::from_secs(1));
    let session_manager =
        SessionManager::new(store.clone(), driver, bus.clone(), time_source.clone(), dir.path().join("sessions"), Duration::from_secs(5), Duration::from_secs(1));
    let git = GitAdapter::new("git", "gh");
    let worktrees = WorktreeManager::new(git.clone(), dir.path().join("worktrees"));
    let scheduler = Scheduler::new(
        store,
        bus,
        time_source,
        session_manager,
        assessor,
        git,
        worktrees,
        4,
        10,
        dir.path().join("default"),
    );
    (scheduler, dir)
}

#[tokio::test]
async fn dedupe_keeps_lowest_position_and_cancels_rest() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    let a = store.create_task(Task::builder().title("Fix the bug").position(5).build()).await.unwrap();
    let b = store.create_task(Task::builder().title("fix THE bug").position(2).build()).await.unwrap();
    let c = store.create_task(Task::builder().title("unrelated").position(1).build()).await.unwrap();

    let cancelled = scheduler.dedupe_tasks().await.unwrap();
    assert_eq!(cancelled, 1);

    let a = store.get_task(&a.id).await.unwrap().unwrap();
    let b = store.get_task(&b.id).await.unwrap().unwrap();
    let c = store.get_task(&c.id).await.unwrap().unwrap();
    assert_eq!(a.status, TaskStatus::Cancelled);
    assert_eq!(b.status, TaskStatus::Pending);
    assert_eq!(c.status, TaskStatus::Pending);
}

#[tokio::test]
async fn dedupe_is_idempotent_on_second_run() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    store.create_task(Task::builder().title("dup").position(1).build()).await.unwrap();
    store.create_task(Task::builder().title("dup").position(2).build()).await.unwrap();

    assert_eq!(scheduler.dedupe_tasks().await.unwrap(), 1);
    assert_eq!(scheduler.dedupe_tasks().await.unwrap(), 0);
}

#[tokio::test]
async fn assess_phase_applies_conservative_default_on_assessor_failure() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FailingAssessor);
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    let task = store.create_task(Task::builder().title("t1").build()).await.unwrap();
    let applied = scheduler.assess_phase().await.unwrap();
    assert_eq!(applied, 1);

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.complexity, Some(Complexity::Medium));
    assert_eq!(task.recommended_model.as_deref(), Some("sonnet"));
}

#[tokio::test]
async fn assess_phase_applies_returned_assessment() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let task = store.create_task(Task::builder().title("t1").build()).await.unwrap();

    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor {
        results: vec![AssessmentResult {
            id: task.id,
            complexity: Complexity::Complex,
            recommended_model: "opus".to_string(),
            assessment: Assessment { reasoning: Some("big".into()), subtasks: vec![], should_decompose: false },
            comment: Some("looks tricky".to_string()),
        }],
    });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    scheduler.assess_phase().await.unwrap();
    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.complexity, Some(Complexity::Complex));
    assert_eq!(task.recommended_model.as_deref(), Some("opus"));

    let comments = store.list_comments(&task.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content, "looks tricky");
}

#[tokio::test]
async fn decompose_creates_children_positioned_before_parent() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    let mut parent = Task::builder().title("big task").position(10).build();
    parent.metadata.assessment =
        Some(Assessment { reasoning: None, subtasks: vec!["part one".into(), "part two".into()], should_decompose: true });
    let parent = store.create_task(parent).await.unwrap();

    scheduler.decompose(parent.clone()).await.unwrap();

    let parent = store.get_task(&parent.id).await.unwrap().unwrap();
    assert_eq!(parent.status, TaskStatus::Decomposed);
    assert_eq!(parent.metadata.decomposed_into.len(), 2);

    let children = store.list_tasks(TaskFilter { parent_id: Some(parent.id), ..Default::default() }).await.unwrap();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c.position < parent.position));
    assert!(children.iter().all(|c| c.metadata.active));
}

#[tokio::test]
async fn mark_task_failed_requeues_pending_with_incremented_retry_count() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    let mut task = Task::builder().status(TaskStatus::Executing).build();
    task.active_session_id = Some(SessionId::new());
    let task = store.create_task(task).await.unwrap();

    scheduler.mark_task_failed(task.clone(), "agent crashed".to_string()).await.unwrap();

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.metadata.retry_count, 1);
    assert_eq!(task.metadata.error.as_deref(), Some("agent crashed"));
    assert!(task.active_session_id.is_none());
}

#[tokio::test]
async fn check_parent_completion_waits_for_all_children() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    let parent = store.create_task(Task::builder().title("parent").status(TaskStatus::Decomposed).build()).await.unwrap();
    let mut child_a = Task::builder().title("child a").status(TaskStatus::Completed).build();
    child_a.parent_task_id = Some(parent.id);
    let child_a = store.create_task(child_a).await.unwrap();
    let mut child_b = Task::builder().title("child b").status(TaskStatus::Executing).build();
    child_b.parent_task_id = Some(parent.id);
    let child_b = store.create_task(child_b).await.unwrap();

    scheduler.check_parent_completion(parent.id).await.unwrap();
    let parent_after = store.get_task(&parent.id).await.unwrap().unwrap();
    assert_eq!(parent_after.status, TaskStatus::Decomposed, "still waiting on child_b");

    let clock_for_child = FakeClock::new();
    let mut child_b = store.get_task(&child_b.id).await.unwrap().unwrap();
    child_b.transition_to(TaskStatus::ReadyForReview, &clock_for_child);
    store.update_task(child_b).await.unwrap();

    scheduler.check_parent_completion(parent.id).await.unwrap();
    let parent_after = store.get_task(&parent.id).await.unwrap().unwrap();
    assert_eq!(parent_after.status, TaskStatus::ReadyForReview);

    let _ = child_a;
}

#[tokio::test]
async fn check_parent_completion_propagates_failure() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    let parent = store.create_task(Task::builder().title("parent").status(TaskStatus::Decomposed).build()).await.unwrap();
    let mut child = Task::builder().title("child").status(TaskStatus::Failed).build();
    child.parent_task_id = Some(parent.id);
    store.create_task(child).await.unwrap();

    scheduler.check_parent_completion(parent.id).await.unwrap();
    let parent_after = store.get_task(&parent.id).await.unwrap().unwrap();
    assert_eq!(parent_after.status, TaskStatus::Failed);
}

#[tokio::test]
async fn cancel_task_transitions_pending_task_to_cancelled() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    let task = store.create_task(Task::builder().title("cancel me").build()).await.unwrap();
    scheduler.cancel_task(task.id).await.unwrap();
    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn cancel_task_on_unknown_id_errors() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());
    let result = scheduler.cancel_task(TaskId::new()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn launch_without_project_runs_in_default_working_dir() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, dir) = scheduler_with(assessor, store.clone(), clock.clone());

    let task = store
        .create_task(Task::builder().title("t1").complexity(Some(Complexity::Simple)).build())
        .await
        .unwrap();

    scheduler.launch(task.clone()).await.unwrap();

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Executing);
    assert!(task.active_session_id.is_some());

    let session = store.get_session(&task.active_session_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(session.working_dir, dir.path().join("default"));
}

#[tokio::test]
async fn execute_phase_launches_assessed_tasks_up_to_slots() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    store.create_task(Task::builder().title("ready").complexity(Some(Complexity::Simple)).build()).await.unwrap();

    scheduler.execute_phase().await.unwrap();

    let executing = store.list_tasks(TaskFilter { status: Some(TaskStatus::Executing), ..Default::default() }).await.unwrap();
    assert_eq!(executing.len(), 1);
}

#[tokio::test]
async fn cleanup_stale_worktrees_skips_projects_without_git() {
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let clock = Arc::new(FakeClock::new());
    let assessor: Arc<dyn Assessor> = Arc::new(FixedAssessor { results: vec![] });
    let (scheduler, _dir) = scheduler_with(assessor, store.clone(), clock.clone());

    store.create_project(Project::builder().remote_repo(None).build()).await.unwrap();
    scheduler.cleanup_stale_worktrees().await.unwrap();
}
