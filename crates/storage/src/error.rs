// SPDX-License-Identifier: MIT

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("reading store snapshot {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("writing store snapshot {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("decoding store snapshot {0}: {1}")]
    Decode(PathBuf, serde_json::Error),
    #[error("encoding store snapshot: {0}")]
    Encode(serde_json::Error),
    #[error("no such task: {0}")]
    NoSuchTask(String),
    #[error("no such session: {0}")]
    NoSuchSession(String),
    #[error("no such project: {0}")]
    NoSuchProject(String),
}
