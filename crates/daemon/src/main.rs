// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use taskforge_core::Config;

/// The TaskForge scheduling daemon.
#[derive(Parser, Debug)]
#[command(name = "taskforged", version, about = "TaskForge scheduling daemon")]
struct Cli {
    /// Path to the TOML config file. Missing file falls back to defaults.
    #[arg(long, default_value = "taskforge.toml")]
    config: PathBuf,

    /// Directory for rolling log files.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = taskforge_daemon::logging::init(&cli.log_dir)?;

    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "no config file found, using defaults");
        Config::default()
    };

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal");
        shutdown_signal.cancel();
    });

    tracing::info!(store = %config.store_path.display(), "starting taskforged");
    taskforge_daemon::run(config, shutdown).await?;
    Ok(())
}
