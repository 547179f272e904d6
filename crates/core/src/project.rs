// SPDX-License-Identifier: MIT

//! Project identifier and record: a git repository context a task can run in.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a project.
    #[derive(Default)]
    pub struct ProjectId("prj-");
}

/// A git repository context. `remote_repo` is the "owner/repo" handle used
/// for PR creation; `local_dir` is the main clone worktrees fork from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub local_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_repo: Option<String>,
    pub default_branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub file_map: HashMap<String, String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Project {
    pub fn new(name: impl Into<String>, local_dir: PathBuf, now_ms: u64) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            local_dir,
            remote_repo: None,
            default_branch: "main".to_string(),
            summary: None,
            file_map: HashMap::new(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// True if this project has a remote repo handle (so worktree creation
    /// and PR creation are possible for it).
    pub fn has_git_repo(&self) -> bool {
        self.remote_repo.is_some()
    }
}

crate::builder! {
    pub struct ProjectBuilder => Project {
        into {
            name: String = "demo",
            default_branch: String = "main",
        }
        set {
            local_dir: PathBuf = PathBuf::from("/tmp/demo"),
            remote_repo: Option<String> = Some("acme/demo".to_string()),
            summary: Option<String> = None,
            file_map: HashMap<String, String> = HashMap::new(),
            created_at_ms: u64 = 0,
            updated_at_ms: u64 = 0,
        }
        computed {
            id: ProjectId = ProjectId::new(),
        }
    }
}
