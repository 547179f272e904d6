// SPDX-License-Identifier: MIT

//! `taskforge daemon` — run the scheduling engine in the foreground.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;

use taskforge_core::Config;

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Run the heartbeat loop until Ctrl-C.
    Run {
        #[arg(long, default_value = "taskforge.toml")]
        config: PathBuf,
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,
    },
}

pub async fn handle(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Run { config, log_dir } => run(config, log_dir).await,
    }
}

async fn run(config_path: PathBuf, log_dir: PathBuf) -> Result<()> {
    let _guard = taskforge_daemon::logging::init(&log_dir)?;

    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        tracing::warn!(path = %config_path.display(), "no config file found, using defaults");
        Config::default()
    };

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_signal.cancel();
    });

    taskforge_daemon::run(config, shutdown).await?;
    Ok(())
}
