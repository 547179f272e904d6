// SPDX-License-Identifier: MIT

//! Process-wide logging setup (§4.0 ambient): `tracing-subscriber` for
//! human-readable stdout output plus a `tracing-appender` rolling file
//! sink, matching the teacher's `ojd` binary's logging install.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. The returned [`WorkerGuard`] must be kept
/// alive for the lifetime of the process — dropping it flushes and closes
/// the non-blocking file writer.
pub fn init(log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "taskforged.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer().with_target(true);
    let file_layer = fmt::layer().with_target(true).with_ansi(false).with_writer(non_blocking);

    tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).try_init()?;

    Ok(guard)
}
