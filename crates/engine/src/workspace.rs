// SPDX-License-Identifier: MIT

//! Worktree Manager (SPEC_FULL.md §4.6): creates and tears down isolated
//! git worktrees per task, and garbage-collects worktrees whose branch is
//! no longer held by an active task.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use taskforge_adapters::GitAdapter;
use taskforge_core::Project;

/// Slugify a task title for use in a branch name: lowercase, collapse
/// non-`[a-z0-9]` runs to a single `-`, trim to 40 chars (§4.5).
pub fn slug(title: &str) -> String {
    let lower = title.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_sep = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('-');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_matches('-');
    let truncated: String = trimmed.chars().take(40).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Branch name for a task: `task-{id}-{slug(title)}`.
pub fn branch_name(task_id: &str, title: &str) -> String {
    format!("task-{task_id}-{}", slug(title))
}

pub struct Worktree {
    pub branch: String,
    pub path: PathBuf,
}

/// Manages worktree creation, removal, and GC for one project.
#[derive(Clone)]
pub struct WorktreeManager {
    git: GitAdapter,
    worktrees_dir: PathBuf,
}

impl WorktreeManager {
    pub fn new(git: GitAdapter, worktrees_dir: PathBuf) -> Self {
        Self { git, worktrees_dir }
    }

    /// Create an isolated worktree on a new branch for `task_id`/`title`,
    /// branched from `origin/<default_branch>` after a fetch. On any git
    /// failure, returns `None` so the caller falls back to the project's
    /// main clone (§4.5).
    pub async fn create(&self, project: &Project, task_id: &str, title: &str) -> Option<Worktree> {
        let branch = branch_name(task_id, title);
        let path = self.worktrees_dir.join(format!("task-{task_id}-{}", slug(title)));

        if self.git.fetch(&project.local_dir, "origin").await.is_err() {
            tracing::warn!(project = %project.name, "fetch failed, falling back to main clone");
            return None;
        }
        let base_ref = format!("origin/{}", project.default_branch);
        match self.git.worktree_add(&project.local_dir, &branch, &path, &base_ref).await {
            Ok(()) => Some(Worktree { branch, path }),
            Err(e) => {
                tracing::warn!(project = %project.name, branch = %branch, error = %e, "worktree add failed");
                None
            }
        }
    }

    pub async fn remove(&self, project: &Project, path: &Path) {
        if let Err(e) = self.git.worktree_remove(&project.local_dir, path).await {
            tracing::warn!(path = %path.display(), error = %e, "worktree remove failed");
        }
    }

    pub async fn delete_branch(&self, project: &Project, branch: &str) {
        if let Err(e) = self.git.delete_branch(&project.local_dir, branch).await {
            tracing::warn!(branch = %branch, error = %e, "branch delete failed");
        }
    }

    /// Remove every worktree under `project` whose branch is not in
    /// `active_branches`, then prune (§4.5 step 7, §4.6 `gc`).
    pub async fn gc(&self, project: &Project, active_branches: &HashSet<String>) {
        let worktrees = match self.git.list_worktrees(&project.local_dir).await {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(project = %project.name, error = %e, "worktree list failed, skipping gc");
                return;
            }
        };
        for (branch, path) in worktrees {
            if branch == project.default_branch || active_branches.contains(&branch) {
                continue;
            }
            if path == project.local_dir {
                continue;
            }
            self.remove(project, &path).await;
        }
        if let Err(e) = self.git.prune_worktrees(&project.local_dir).await {
            tracing::warn!(project = %project.name, error = %e, "worktree prune failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_collapses_separators() {
        assert_eq!(slug("Add README!!"), "add-readme");
        assert_eq!(slug("Fix  the   bug"), "fix-the-bug");
    }

    #[test]
    fn slug_truncates_to_40_chars() {
        let long = "a".repeat(100);
        assert_eq!(slug(&long).len(), 40);
    }

    #[test]
    fn slug_trims_leading_trailing_separators() {
        assert_eq!(slug("  -- weird title -- "), "weird-title");
    }

    #[test]
    fn branch_name_includes_id_and_slug() {
        assert_eq!(branch_name("42", "Add README"), "task-42-add-readme");
    }
}
