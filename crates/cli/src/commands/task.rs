// SPDX-License-Identifier: MIT

//! `taskforge task` — task queue management commands.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};

use taskforge_core::{ProjectId, SystemClock, Task, TaskId, TaskStatus};
use taskforge_storage::{Store, TaskFilter};

use crate::output::{format_or_json, handle_list, OutputFormat};

#[derive(Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Queue a new task.
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Project id this task runs against.
        #[arg(long)]
        project: Option<String>,
        /// Relative scheduling priority; higher runs first.
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// List queued tasks.
    List {
        /// Filter by status: pending, executing, ready_for_review,
        /// completed, failed, cancelled, decomposed.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Cancel a queued or executing task.
    Cancel { id: String },
}

pub async fn handle(store: &Arc<dyn Store>, command: TaskCommand, format: OutputFormat) -> Result<()> {
    match command {
        TaskCommand::Add { title, description, project, priority } => {
            add(store, title, description, project, priority, format).await
        }
        TaskCommand::List { status, project, limit } => list(store, status, project, limit, format).await,
        TaskCommand::Cancel { id } => cancel(store, id, format).await,
    }
}

async fn add(
    store: &Arc<dyn Store>,
    title: String,
    description: String,
    project: Option<String>,
    priority: i32,
    format: OutputFormat,
) -> Result<()> {
    let clock = SystemClock;
    let seq = store.next_seq().await?;
    let mut task = Task::new(title, description, seq, &clock);
    task.priority = priority;
    task.project_id = project;
    let created = store.create_task(task).await?;

    format_or_json(format, &created, || {
        println!("Queued task {} ({})", created.id, created.title);
    })
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    Ok(match s {
        "pending" => TaskStatus::Pending,
        "assessing" => TaskStatus::Assessing,
        "executing" => TaskStatus::Executing,
        "decomposed" => TaskStatus::Decomposed,
        "ready_for_review" => TaskStatus::ReadyForReview,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        other => anyhow::bail!("unknown status {other:?}"),
    })
}

async fn list(
    store: &Arc<dyn Store>,
    status: Option<String>,
    project: Option<String>,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let filter = TaskFilter {
        status: status.as_deref().map(parse_status).transpose()?,
        parent_id: None,
        project_id: project.map(ProjectId::from),
        limit: Some(limit),
        offset: 0,
    };
    let tasks = store.list_tasks(filter).await?;

    handle_list(format, &tasks, "No tasks queued", |tasks| {
        for t in tasks {
            println!(
                "{}  {:<18}  {:>4}  {}",
                t.id,
                t.status.to_string(),
                t.priority,
                t.title
            );
        }
    })
}

async fn cancel(store: &Arc<dyn Store>, id: String, format: OutputFormat) -> Result<()> {
    let task_id = TaskId::from(id);
    let Some(mut task) = store.get_task(&task_id).await? else {
        anyhow::bail!("no such task: {task_id}");
    };
    let clock = SystemClock;
    if !task.transition_to(TaskStatus::Cancelled, &clock) {
        anyhow::bail!("task {task_id} cannot be cancelled from status {}", task.status);
    }
    task.metadata.cancelled_reason = Some("cancelled via cli".to_string());
    let updated = store.update_task(task).await?;

    format_or_json(format, &updated, || {
        println!("Cancelled task {}", updated.id);
    })
}
