// SPDX-License-Identifier: MIT

//! `taskforge` — operator CLI for the task queue: `task add`/`list`/`cancel`,
//! `project add`/`list`, and `daemon run`. Talks to the [`Store`] directly
//! rather than through a running daemon process, grounded on the teacher's
//! `oj` CLI command layout.

mod commands;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use taskforge_storage::{FileStore, Store};

use commands::{daemon, project, task};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "taskforge", version, about = "Operator CLI for the TaskForge scheduling engine")]
struct Cli {
    /// Path to the store's JSON snapshot file.
    #[arg(long, global = true, default_value = "taskforge.json")]
    store: PathBuf,

    /// Output format.
    #[arg(long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Task queue management.
    Task(task::TaskArgs),
    /// Project registration.
    Project(project::ProjectArgs),
    /// Run the scheduling engine.
    Daemon(daemon::DaemonArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Daemon(args) => daemon::handle(args.command).await,
        Command::Task(args) => {
            let store: Arc<dyn Store> = Arc::new(FileStore::open(&cli.store)?);
            task::handle(&store, args.command, cli.format).await
        }
        Command::Project(args) => {
            let store: Arc<dyn Store> = Arc::new(FileStore::open(&cli.store)?);
            project::handle(&store, args.command, cli.format).await
        }
    }
}
