// SPDX-License-Identifier: MIT

//! `taskforge project` — project registration commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};

use taskforge_core::{Clock, Project, SystemClock};
use taskforge_storage::Store;

use crate::output::{format_or_json, handle_list, OutputFormat};

#[derive(Args)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommand,
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Register a project the scheduler can launch tasks against.
    Add {
        name: String,
        /// Path to the project's main git clone.
        local_dir: PathBuf,
        /// "owner/repo" handle used for PR creation.
        #[arg(long)]
        remote: Option<String>,
    },
    /// List registered projects.
    List,
}

pub async fn handle(store: &Arc<dyn Store>, command: ProjectCommand, format: OutputFormat) -> Result<()> {
    match command {
        ProjectCommand::Add { name, local_dir, remote } => add(store, name, local_dir, remote, format).await,
        ProjectCommand::List => list(store, format).await,
    }
}

async fn add(
    store: &Arc<dyn Store>,
    name: String,
    local_dir: PathBuf,
    remote: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let clock = SystemClock;
    let mut project = Project::new(name, local_dir, clock.epoch_ms());
    project.remote_repo = remote;
    let created = store.create_project(project).await?;

    format_or_json(format, &created, || {
        println!("Registered project {} ({})", created.id, created.name);
    })
}

async fn list(store: &Arc<dyn Store>, format: OutputFormat) -> Result<()> {
    let projects = store.list_projects().await?;
    handle_list(format, &projects, "No projects registered", |projects| {
        for p in projects {
            println!("{}  {:<20}  {}", p.id, p.name, p.local_dir.display());
        }
    })
}
