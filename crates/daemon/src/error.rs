// SPDX-License-Identifier: MIT

//! Top-level daemon error type, wrapping the collaborators wired up in
//! [`crate::run`].

use taskforge_core::ConfigError;
use taskforge_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
