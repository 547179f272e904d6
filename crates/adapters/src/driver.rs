// SPDX-License-Identifier: MIT

//! Agent CLI Driver (§4.3): spawns and supervises a single agent-CLI
//! subprocess, parsing its `stream-json` stdout and scanning for rate-limit
//! signals in both streams.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use taskforge_wire::stream_event::ResultEvent;
use taskforge_wire::{contains_rate_limit_phrase, StreamEvent};

use crate::subprocess::terminate_pid;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("spawning agent cli {0:?}: {1}")]
    Spawn(PathBuf, std::io::Error),
    #[error("opening log file {0:?}: {1}")]
    OpenLog(PathBuf, std::io::Error),
    #[error("waiting on agent cli: {0}")]
    Wait(std::io::Error),
}

/// Result of one `run_task` invocation.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub pid: Option<u32>,
    pub result_json: Option<ResultEvent>,
    pub is_rate_limited: bool,
    pub rate_limit_text: Option<String>,
    pub error: Option<String>,
    pub timed_out: bool,
}

/// Spawns the agent CLI in streaming-JSON mode.
#[derive(Clone)]
pub struct AgentCliDriver {
    cli_path: String,
    terminate_grace: Duration,
}

impl AgentCliDriver {
    pub fn new(cli_path: impl Into<String>, terminate_grace: Duration) -> Self {
        Self { cli_path: cli_path.into(), terminate_grace }
    }

    /// Run one agent-CLI invocation to completion (or until `timeout`).
    ///
    /// `on_output` is called for every non-JSON stdout line; `on_json_event`
    /// for every successfully parsed `stream-json` event. `on_pid` is called
    /// once, synchronously, the moment the child process has been spawned —
    /// this is how callers populate an in-memory `session_id -> pid` map
    /// while the subprocess is still running, rather than waiting for this
    /// function to return (§4.4).
    #[allow(clippy::too_many_arguments)]
    pub async fn run_task<F, G, H>(
        &self,
        prompt: &str,
        working_dir: &Path,
        model: Option<&str>,
        stdout_path: &Path,
        stderr_path: &Path,
        mut on_output: F,
        mut on_json_event: G,
        on_pid: H,
        timeout: Duration,
    ) -> Result<RunOutcome, DriverError>
    where
        F: FnMut(&str) + Send,
        G: FnMut(&StreamEvent) + Send,
        H: FnOnce(u32) + Send,
    {
        let mut args: Vec<&str> =
            vec!["-p", "--verbose", "--output-format", "stream-json", "--dangerously-skip-permissions"];
        if let Some(m) = model {
            args.push("--model");
            args.push(m);
        }
        args.push(prompt);

        let mut cmd = Command::new(&self.cli_path);
        cmd.args(&args)
            .current_dir(working_dir)
            .env_remove("ANTHROPIC_API_KEY")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let span = tracing::info_span!("agent.run_task", cli = %self.cli_path, workspace = %working_dir.display());
        let start = std::time::Instant::now();

        let mut child = {
            let _enter = span.enter();
            cmd.spawn().map_err(|e| {
                tracing::error!(error = %e, "spawn failed");
                DriverError::Spawn(PathBuf::from(&self.cli_path), e)
            })?
        };
        let pid = child.id();
        if let Some(pid) = pid {
            on_pid(pid);
        }

        let Some(stdout) = child.stdout.take() else {
            return Err(DriverError::Spawn(
                PathBuf::from(&self.cli_path),
                std::io::Error::other("child stdout was not piped"),
            ));
        };
        let Some(stderr) = child.stderr.take() else {
            return Err(DriverError::Spawn(
                PathBuf::from(&self.cli_path),
                std::io::Error::other("child stderr was not piped"),
            ));
        };

        let mut stdout_log =
            File::create(stdout_path).await.map_err(|e| DriverError::OpenLog(stdout_path.to_path_buf(), e))?;
        let mut stderr_log =
            File::create(stderr_path).await.map_err(|e| DriverError::OpenLog(stderr_path.to_path_buf(), e))?;

        let stdout_task = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut result_json = None;
            let mut rate_limited = false;
            let mut rate_limit_text = None;
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = stdout_log.write_all(line.as_bytes()).await;
                let _ = stdout_log.write_all(b"\n").await;
                if line.trim().is_empty() {
                    continue;
                }
                match StreamEvent::parse_line(&line) {
                    Some(event) => {
                        if let Some(result) = event.as_result() {
                            if result.is_error && contains_rate_limit_phrase(&result.result) {
                                rate_limited = true;
                                rate_limit_text = Some(result.result.clone());
                            }
                            result_json = Some(result.clone());
                        }
                        on_json_event(&event);
                    }
                    None => {
                        if contains_rate_limit_phrase(&line) {
                            rate_limited = true;
                            rate_limit_text = Some(line.clone());
                        }
                        on_output(&line);
                    }
                }
            }
            (result_json, rate_limited, rate_limit_text)
        };

        let stderr_task = async {
            let mut lines = BufReader::new(stderr).lines();
            let mut rate_limited = false;
            let mut rate_limit_text = None;
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = stderr_log.write_all(line.as_bytes()).await;
                let _ = stderr_log.write_all(b"\n").await;
                if contains_rate_limit_phrase(&line) {
                    rate_limited = true;
                    rate_limit_text = Some(line.clone());
                }
            }
            (rate_limited, rate_limit_text)
        };

        let run = async {
            let (stdout_res, stderr_res) = tokio::join!(stdout_task, stderr_task);
            let status = child.wait().await.map_err(DriverError::Wait)?;
            Ok::<_, DriverError>((stdout_res, stderr_res, status))
        };

        use tracing::Instrument;
        match tokio::time::timeout(timeout, run.instrument(span.clone())).await {
            Ok(Ok(((result_json, out_limited, out_text), (err_limited, err_text), status))) => {
                let is_rate_limited = out_limited || err_limited;
                let rate_limit_text = out_text.or(err_text);
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::info!(elapsed_ms, exit_code = ?status.code(), is_rate_limited, "agent run finished");
                Ok(RunOutcome {
                    exit_code: status.code(),
                    pid,
                    result_json,
                    is_rate_limited,
                    rate_limit_text,
                    error: None,
                    timed_out: false,
                })
            }
            Ok(Err(e)) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::error!(elapsed_ms, error = %e, "agent run failed");
                Ok(RunOutcome { pid, error: Some(e.to_string()), ..Default::default() })
            }
            Err(_) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::error!(elapsed_ms, "agent run timed out");
                if let Some(pid) = pid {
                    terminate_pid(pid, self.terminate_grace).await;
                }
                Ok(RunOutcome {
                    pid,
                    error: Some(format!("timed out after {timeout:?}")),
                    timed_out: true,
                    ..Default::default()
                })
            }
        }
    }

    /// Terminate a running session's subprocess: graceful signal, then
    /// force-kill after `grace` (§4.3 `terminate_process`).
    pub async fn terminate_process(&self, pid: u32, grace: Duration) {
        terminate_pid(pid, grace).await;
    }
}
