// SPDX-License-Identifier: MIT

//! Scheduler-level error type.

use taskforge_core::TaskId;
use taskforge_storage::StoreError;

use crate::assess::AssessError;
use crate::session_manager::SessionManagerError;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionManagerError),
    #[error(transparent)]
    Assess(#[from] AssessError),
    #[error("no such task {0}")]
    NoSuchTask(TaskId),
}
