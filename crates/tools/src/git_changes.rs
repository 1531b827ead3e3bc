//! Git change source: the unstaged working-tree diff of a repository.
//!
//! Falls back to listing untracked files when `git diff` is empty, so a
//! repository with only new files still has something to review.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use toolloop_core::change_source::ChangeSource;
use toolloop_core::error::ChangeSourceError;
use tracing::{debug, warn};

pub struct GitChangeSource {
    repo_dir: Option<PathBuf>,
}

impl GitChangeSource {
    /// Read changes from the current working directory.
    pub fn new() -> Self {
        Self { repo_dir: None }
    }

    /// Read changes from the repository at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: Some(dir.into()),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, ChangeSourceError> {
        let command = format!("git {}", args.join(" "));
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = &self.repo_dir {
            cmd.current_dir(dir);
        }

        debug!(command = %command, "Running git");

        let output = cmd
            .output()
            .await
            .map_err(|e| ChangeSourceError::CommandFailed {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let status = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(command = %command, exit_code = status, "git failed");
            return Err(ChangeSourceError::NonZeroExit {
                command,
                status,
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for GitChangeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeSource for GitChangeSource {
    fn name(&self) -> &str {
        "git"
    }

    async fn changes(&self) -> Result<String, ChangeSourceError> {
        let diff = self.git(&["diff"]).await?;
        if !diff.is_empty() {
            return Ok(diff);
        }

        let status = self.git(&["status", "--porcelain"]).await?;
        Ok(untracked_listing(&status).unwrap_or_default())
    }
}

/// Summarize the untracked (`??`) entries of `git status --porcelain`.
fn untracked_listing(porcelain: &str) -> Option<String> {
    let files: Vec<&str> = porcelain
        .lines()
        .filter_map(|line| line.strip_prefix("??"))
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .collect();

    if files.is_empty() {
        None
    } else {
        Some(format!("Untracked files:\n{}", files.join("\n")))
    }
}
