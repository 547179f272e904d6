// SPDX-License-Identifier: MIT

//! Git/PR Adapter (§4.7, §6 "Git/PR contract"): a thin subprocess wrapper
//! around `git` and a `gh`-compatible remote-repo CLI, used by the worktree
//! manager and by `mark_task_ready_for_review`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::Instrument;

use crate::subprocess::{run_with_timeout, SubprocessError};

const GIT_TIMEOUT: Duration = Duration::from_secs(60);
const PR_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("git command failed (exit {0:?}): {1}")]
    CommandFailed(Option<i32>, String),
}

/// Thin wrapper over `git` and `gh` subprocess invocations.
#[derive(Clone)]
pub struct GitAdapter {
    git_path: String,
    gh_path: String,
}

impl GitAdapter {
    pub fn new(git_path: impl Into<String>, gh_path: impl Into<String>) -> Self {
        Self { git_path: git_path.into(), gh_path: gh_path.into() }
    }

    async fn git(&self, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
        let subcommand = args.first().copied().unwrap_or("");
        let span = tracing::info_span!("git.command", subcommand, cwd = %cwd.display());
        let start = std::time::Instant::now();
        let result = self.git_inner(cwd, args).instrument(span).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(elapsed_ms, subcommand, "git command finished"),
            Err(e) => tracing::warn!(elapsed_ms, subcommand, error = %e, "git command failed"),
        }
        result
    }

    async fn git_inner(&self, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
        let out = run_with_timeout(&self.git_path, args, Some(cwd), GIT_TIMEOUT).await?;
        if !out.success() {
            return Err(GitError::CommandFailed(out.status.code(), out.stderr));
        }
        Ok(out.stdout)
    }

    pub async fn fetch(&self, repo_dir: &Path, remote: &str) -> Result<(), GitError> {
        self.git(repo_dir, &["fetch", remote]).await?;
        Ok(())
    }

    /// `git worktree add -b <branch> <path> <base_ref>`.
    pub async fn worktree_add(&self, repo_dir: &Path, branch: &str, path: &Path, base_ref: &str) -> Result<(), GitError> {
        let path_str = path.to_string_lossy().into_owned();
        self.git(repo_dir, &["worktree", "add", "-b", branch, &path_str, base_ref]).await?;
        Ok(())
    }

    pub async fn worktree_remove(&self, repo_dir: &Path, path: &Path) -> Result<(), GitError> {
        let path_str = path.to_string_lossy().into_owned();
        match self.git(repo_dir, &["worktree", "remove", "--force", &path_str]).await {
            Ok(_) => Ok(()),
            Err(GitError::CommandFailed(_, stderr)) if stderr.contains("not a working tree") => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Parses `git worktree list --porcelain` into `(branch, path)` pairs.
    pub async fn list_worktrees(&self, repo_dir: &Path) -> Result<Vec<(String, PathBuf)>, GitError> {
        let out = self.git(repo_dir, &["worktree", "list", "--porcelain"]).await?;
        Ok(parse_worktree_porcelain(&out))
    }

    pub async fn prune_worktrees(&self, repo_dir: &Path) -> Result<(), GitError> {
        self.git(repo_dir, &["worktree", "prune"]).await?;
        Ok(())
    }

    pub async fn delete_branch(&self, repo_dir: &Path, branch: &str) -> Result<(), GitError> {
        match self.git(repo_dir, &["branch", "-D", branch]).await {
            Ok(_) => Ok(()),
            Err(GitError::CommandFailed(_, stderr)) if stderr.contains("not found") => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn commit_all(&self, worktree_dir: &Path, message: &str) -> Result<(), GitError> {
        self.git(worktree_dir, &["add", "-A"]).await?;
        match self.git(worktree_dir, &["commit", "-m", message]).await {
            Ok(_) => Ok(()),
            Err(GitError::CommandFailed(_, stderr)) if stderr.contains("nothing to commit") => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn push(&self, worktree_dir: &Path, branch: &str) -> Result<(), GitError> {
        self.git(worktree_dir, &["push", "-u", "origin", branch]).await?;
        Ok(())
    }

    /// Opens a PR via the `gh`-compatible CLI, returning its URL.
    pub async fn create_pr(
        &self,
        worktree_dir: &Path,
        repo_handle: &str,
        branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<String, GitError> {
        let args = [
            "pr",
            "create",
            "--repo",
            repo_handle,
            "--head",
            branch,
            "--base",
            base_branch,
            "--title",
            title,
            "--body",
            body,
        ];
        let out = run_with_timeout(&self.gh_path, &args, Some(worktree_dir), PR_TIMEOUT).await?;
        if !out.success() {
            return Err(GitError::CommandFailed(out.status.code(), out.stderr));
        }
        Ok(out.stdout.trim().to_string())
    }
}

fn parse_worktree_porcelain(text: &str) -> Vec<(String, PathBuf)> {
    let mut result = Vec::new();
    let mut current_path: Option<PathBuf> = None;
    for line in text.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            current_path = Some(PathBuf::from(path));
        } else if let Some(branch_ref) = line.strip_prefix("branch ") {
            let branch = branch_ref.strip_prefix("refs/heads/").unwrap_or(branch_ref);
            if let Some(path) = current_path.take() {
                result.push((branch.to_string(), path));
            }
        } else if line.is_empty() {
            current_path = None;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_worktree_porcelain_output() {
        let text = "worktree /repo\nHEAD abc123\nbranch refs/heads/main\n\n\
                     worktree /repo/wt/task-1\nHEAD def456\nbranch refs/heads/task-1-fix\n\n";
        let parsed = parse_worktree_porcelain(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], ("main".to_string(), PathBuf::from("/repo")));
        assert_eq!(parsed[1], ("task-1-fix".to_string(), PathBuf::from("/repo/wt/task-1")));
    }

    #[test]
    fn parses_detached_worktree_without_branch() {
        let text = "worktree /repo/wt/detached\nHEAD abc123\ndetached\n\n";
        let parsed = parse_worktree_porcelain(text);
        assert!(parsed.is_empty());
    }
}
