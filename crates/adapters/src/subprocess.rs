// SPDX-License-Identifier: MIT

//! Shared subprocess helpers: run-with-timeout and graceful/forced
//! termination, used by the CLI driver, the probe, and the git adapter.
//! Grounded on the teacher's `run_with_timeout` shape in `oj-adapters`.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum SubprocessError {
    #[error("spawning {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("{0} timed out after {1:?}")]
    Timeout(String, Duration),
    #[error("waiting on {0}: {1}")]
    Wait(String, std::io::Error),
    #[error("{0}'s {1} was not piped")]
    MissingStdio(String, &'static str),
}

pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `program args` in `cwd`, capturing stdout/stderr to completion,
/// bounded by `timeout`.
pub async fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, SubprocessError> {
    let mut cmd = Command::new(program);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let label = format!("{program} {}", args.join(" "));
    let mut child = cmd.spawn().map_err(|e| SubprocessError::Spawn(label.clone(), e))?;
    let Some(mut stdout) = child.stdout.take() else {
        return Err(SubprocessError::MissingStdio(label, "stdout"));
    };
    let Some(mut stderr) = child.stderr.take() else {
        return Err(SubprocessError::MissingStdio(label, "stderr"));
    };

    let run = async {
        let mut out = String::new();
        let mut err = String::new();
        let (_, _, status) = tokio::join!(
            stdout.read_to_string(&mut out),
            stderr.read_to_string(&mut err),
            child.wait(),
        );
        let status = status.map_err(|e| SubprocessError::Wait(label.clone(), e))?;
        Ok::<_, SubprocessError>(CommandOutput { status, stdout: out, stderr: err })
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => {
            if let Some(pid) = child.id() {
                terminate_pid(pid, Duration::from_secs(2)).await;
            }
            Err(SubprocessError::Timeout(label, timeout))
        }
    }
}

/// Send a graceful terminate signal to `pid`; if it's still alive after
/// `grace`, force-kill. Tolerates "no such process" (§4.3).
pub async fn terminate_pid(pid: u32, grace: Duration) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let nix_pid = Pid::from_raw(pid as i32);
    let _ = kill(nix_pid, Signal::SIGTERM);
    tokio::time::sleep(grace).await;
    if kill(nix_pid, None).is_ok() {
        let _ = kill(nix_pid, Signal::SIGKILL);
    }
}
