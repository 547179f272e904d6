// SPDX-License-Identifier: MIT

//! Session Lifecycle Manager (§4.4): owns the `created -> running ->
//! completed|failed|cancelled` transition for one agent-CLI invocation and
//! the background supervisor task that drives it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use taskforge_adapters::{mark_rate_limited, AgentCliDriver, DriverError};
use taskforge_core::{EntityType, EventType, Session, SessionId, SessionStatus, TaskId, TimeSource};
use taskforge_storage::{Store, StoreError};
use taskforge_wire::parse_reset_time;

use crate::bus::EventBus;
use crate::time_adapter::EpochClock;

/// What the manager tracks in memory for a session that's actually running
/// (§4.4: "The manager holds a mapping (session_id -> pid) and (session_id
/// -> supervisor handle) for the duration of each session"). The store's
/// copy of `pid` only catches up once the supervisor writes it back at
/// completion, so `cancel_session` must consult this map rather than the
/// store to find a genuinely running subprocess.
struct LiveSession {
    pid: Option<u32>,
    supervisor: AbortHandle,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionManagerError {
    #[error("no such session {0}")]
    NoSuchSession(SessionId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("creating session directory {0:?}: {1}")]
    CreateDir(PathBuf, std::io::Error),
}

/// Owns session creation, launch and cancellation. Cheaply `Clone`-able.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    driver: AgentCliDriver,
    bus: EventBus,
    clock: Arc<dyn TimeSource>,
    sessions_dir: PathBuf,
    default_timeout: Duration,
    terminate_grace: Duration,
    live: Arc<Mutex<HashMap<SessionId, LiveSession>>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn Store>,
        driver: AgentCliDriver,
        bus: EventBus,
        clock: Arc<dyn TimeSource>,
        sessions_dir: PathBuf,
        default_timeout: Duration,
        terminate_grace: Duration,
    ) -> Self {
        Self { store, driver, bus, clock, sessions_dir, default_timeout, terminate_grace, live: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Allocate a per-session log directory, persist a `created` session row
    /// and emit `session.created`.
    pub async fn create_session(
        &self,
        task_id: TaskId,
        working_dir: PathBuf,
        model: impl Into<String>,
    ) -> Result<Session, SessionManagerError> {
        let now = self.clock.epoch_ms();
        let dir = self.sessions_dir.join(format!("{}-{now}", task_id.suffix()));
        tokio::fs::create_dir_all(&dir).await.map_err(|e| SessionManagerError::CreateDir(dir.clone(), e))?;
        let stdout_path = dir.join("stdout.log");
        let stderr_path = dir.join("stderr.log");

        let session = Session::new(task_id, working_dir, model, stdout_path, stderr_path, &EpochClock(self.clock.clone()));
        let session = self.store.create_session(session).await?;

        self.bus
            .emit(
                EventType::session_created(),
                EntityType::Session,
                Some(session.id.to_string()),
                serde_json::json!({"task_id": session.task_id.to_string()}),
            )
            .await;

        Ok(session)
    }

    /// Flip a session to `running` and spawn the background supervisor that
    /// drives the agent CLI to completion. Returns `false` if the session
    /// doesn't exist.
    pub async fn start_session(&self, session_id: SessionId, prompt: String) -> Result<bool, SessionManagerError> {
        let Some(mut session) = self.store.get_session(&session_id).await? else {
            return Ok(false);
        };
        session.status = SessionStatus::Running;
        session.started_at_ms = Some(self.clock.epoch_ms());
        let session = self.store.update_session(session).await?;

        self.bus
            .emit(EventType::session_started(), EntityType::Session, Some(session.id.to_string()), serde_json::json!({}))
            .await;

        let session_id = session.id;
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            manager.supervise(session, prompt).await;
        });
        self.live.lock().insert(session_id, LiveSession { pid: None, supervisor: handle.abort_handle() });

        Ok(true)
    }

    /// Terminate a running session's subprocess and mark it `cancelled`. A
    /// no-op if the session is missing or already terminal. Looks up the
    /// subprocess pid and supervisor in the in-memory `live` map first
    /// (§4.4) since the store's `session.pid` only gets written back once
    /// the supervisor's driver call returns, which for a genuinely running
    /// session hasn't happened yet.
    pub async fn cancel_session(&self, session_id: SessionId) -> Result<(), SessionManagerError> {
        let Some(mut session) = self.store.get_session(&session_id).await? else {
            return Err(SessionManagerError::NoSuchSession(session_id));
        };
        if session.status.is_terminal() {
            return Ok(());
        }

        let live = self.live.lock().remove(&session_id);
        let pid = live.as_ref().and_then(|l| l.pid).or(session.pid);
        if let Some(pid) = pid {
            self.driver.terminate_process(pid, self.terminate_grace).await;
        }
        if let Some(live) = live {
            live.supervisor.abort();
        }

        session.status = SessionStatus::Cancelled;
        session.finished_at_ms = Some(self.clock.epoch_ms());
        self.store.update_session(session.clone()).await?;

        self.bus
            .emit(EventType::session_cancelled(), EntityType::Session, Some(session.id.to_string()), serde_json::json!({}))
            .await;
        Ok(())
    }

    /// Inject a rate-limited verdict discovered mid-session into the cached
    /// rate-limit status (§4.2 `mark_rate_limited`, called from the
    /// supervisor when a session's driver outcome signals the limit).
    async fn mark_rate_limited(&self, text: Option<&str>) {
        let now_ms = self.clock.epoch_ms();
        let reset_at_ms = text.map_or(now_ms + 60 * 60 * 1000, |t| parse_reset_time(t, now_ms));
        let status = mark_rate_limited(reset_at_ms, now_ms);
        if let Err(e) = self.store.set_rate_limit_status(status).await {
            tracing::warn!(error = %e, "failed to persist mid-session rate-limit verdict");
        }
    }

    async fn supervise(self, session: Session, prompt: String) {
        let session_id = session.id;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let bus_for_forward = self.bus.clone();
        let session_id_for_forward = session.id;
        let forwarder = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                bus_for_forward
                    .emit(
                        EventType::session_output(),
                        EntityType::Session,
                        Some(session_id_for_forward.to_string()),
                        serde_json::json!({"text": text}),
                    )
                    .await;
            }
        });

        let on_output = {
            let tx = tx.clone();
            move |line: &str| {
                let _ = tx.send(line.to_string());
            }
        };
        let on_json_event = {
            let tx = tx.clone();
            move |event: &taskforge_wire::StreamEvent| {
                if let Some(text) = event.extract_text() {
                    let _ = tx.send(text);
                }
            }
        };
        drop(tx);

        let on_pid = {
            let live = self.live.clone();
            move |pid: u32| {
                if let Some(entry) = live.lock().get_mut(&session_id) {
                    entry.pid = Some(pid);
                }
            }
        };

        let outcome = self
            .driver
            .run_task(
                &prompt,
                &session.working_dir,
                Some(&session.model),
                &session.stdout_path,
                &session.stderr_path,
                on_output,
                on_json_event,
                on_pid,
                self.default_timeout,
            )
            .await;

        let _ = forwarder.await;

        // The subprocess has exited (or the driver gave up on it); it is no
        // longer "running" regardless of what happens below, so stop
        // tracking it in the live map (§4.4).
        self.live.lock().remove(&session_id);

        let Some(mut session) = self.store.get_session(&session.id).await.ok().flatten() else {
            return;
        };
        if session.status == SessionStatus::Cancelled {
            return;
        }

        let now = self.clock.epoch_ms();
        session.finished_at_ms = Some(now);

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                session.status = SessionStatus::Failed;
                let _ = self.store.update_session(session.clone()).await;
                self.bus
                    .emit(
                        EventType::session_failed(),
                        EntityType::Session,
                        Some(session.id.to_string()),
                        serde_json::json!({"error": e.to_string()}),
                    )
                    .await;
                return;
            }
        };

        session.pid = outcome.pid;
        session.exit_code = outcome.exit_code;
        if let Some(result) = &outcome.result_json {
            session.num_turns = result.num_turns;
        }

        if outcome.is_rate_limited {
            session.status = SessionStatus::Failed;
            let _ = self.store.update_session(session.clone()).await;
            self.mark_rate_limited(outcome.rate_limit_text.as_deref()).await;
            self.bus
                .emit(
                    EventType::session_rate_limited(),
                    EntityType::Session,
                    Some(session.id.to_string()),
                    serde_json::json!({"text": outcome.rate_limit_text}),
                )
                .await;
            return;
        }

        let succeeded = outcome.error.is_none()
            && outcome.exit_code == Some(0)
            && !outcome.result_json.as_ref().is_some_and(|r| r.is_error);
        session.status = if succeeded { SessionStatus::Completed } else { SessionStatus::Failed };
        let _ = self.store.update_session(session.clone()).await;

        let (event_type, payload) = if succeeded {
            (EventType::session_completed(), serde_json::json!({"num_turns": session.num_turns}))
        } else {
            (EventType::session_failed(), serde_json::json!({"error": outcome.error, "exit_code": outcome.exit_code}))
        };
        self.bus.emit(event_type, EntityType::Session, Some(session.id.to_string()), payload).await;
    }
}
