//! Source-control and repository-host access.
//!
//! [`SourceControl`] produces a private working copy of a plugin repository
//! inside the probe context's scratch directory. [`RepositoryHost`] answers
//! questions about the hosted repository itself.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::SourceError;

/// A local working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub root: PathBuf,
    pub last_commit_at: DateTime<Utc>,
}

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Clone `url` into `dest` (which must not exist yet).
    async fn checkout(&self, url: &str, dest: &Path) -> Result<Checkout, SourceError>;
}

async fn git(args: &[&str], cwd: Option<&Path>) -> Result<String, SourceError> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(std::process::Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|e| SourceError::Git {
        command: args.first().copied().unwrap_or_default().to_string(),
        detail: format!("failed to run git: {e}"),
    })?;

    if !output.status.success() {
        return Err(SourceError::Git {
            command: args.first().copied().unwrap_or_default().to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Committer date of HEAD in a git work tree.
pub async fn last_commit_at(repo: &Path) -> Result<DateTime<Utc>, SourceError> {
    let raw = git(&["log", "-1", "--format=%cI"], Some(repo)).await?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| SourceError::CommitDate(raw))
}

/// Shallow clones through the `git` executable.
#[derive(Debug, Default, Clone)]
pub struct GitCli;

#[async_trait]
impl SourceControl for GitCli {
    async fn checkout(&self, url: &str, dest: &Path) -> Result<Checkout, SourceError> {
        let dest_str = dest.to_string_lossy();
        debug!(url = %url, dest = %dest_str, "cloning");
        git(&["clone", "--quiet", "--depth", "1", url, &dest_str], None).await?;
        let last_commit_at = last_commit_at(dest).await?;
        Ok(Checkout {
            root: dest.to_path_buf(),
            last_commit_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Repository host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryInfo {
    pub full_name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Look up `owner/name`. `Ok(None)` when the repository does not exist.
    async fn repository(&self, full_name: &str) -> Result<Option<RepositoryInfo>, SourceError>;
}

/// GitHub REST API client.
pub struct GitHubHost {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubHost {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl RepositoryHost for GitHubHost {
    async fn repository(&self, full_name: &str) -> Result<Option<RepositoryInfo>, SourceError> {
        let url = format!("{}/repos/{}", self.api_url, full_name);
        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, "plugin-health")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Host(format!("{url}: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| SourceError::Host(format!("{url}: {e}")))?;
        let info = response
            .json::<RepositoryInfo>()
            .await
            .map_err(|e| SourceError::Host(format!("{url}: {e}")))?;
        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "--quiet"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        std::fs::write(dir.path().join("Jenkinsfile"), "buildPlugin()\n").unwrap();
        run_git(dir.path(), &["add", "."]);
        run_git(dir.path(), &["commit", "--quiet", "-m", "initial"]);
        dir
    }

    #[tokio::test]
    async fn clone_reports_head_commit_date() {
        let origin = make_git_repo();
        let scratch = tempfile::tempdir().unwrap();
        let dest = scratch.path().join("repo");
        let url = format!("file://{}", origin.path().display());

        let checkout = GitCli.checkout(&url, &dest).await.unwrap();

        assert_eq!(checkout.root, dest);
        assert!(dest.join("Jenkinsfile").exists());
        assert!(checkout.last_commit_at <= Utc::now());
        assert_eq!(
            checkout.last_commit_at,
            last_commit_at(origin.path()).await.unwrap()
        );
    }

    #[tokio::test]
    async fn clone_of_missing_repository_fails() {
        let scratch = tempfile::tempdir().unwrap();
        let missing = scratch.path().join("nowhere");
        let url = format!("file://{}", missing.display());
        let err = GitCli
            .checkout(&url, &scratch.path().join("repo"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Git { .. }));
    }

    #[tokio::test]
    async fn last_commit_outside_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(last_commit_at(dir.path()).await.is_err());
    }
}
