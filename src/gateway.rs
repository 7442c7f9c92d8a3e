//! Version-control boundary: the only component permitted to execute
//! repository mutations.
//!
//! The [`VersionControlGateway`] trait is the seam between the pipeline and
//! the underlying tool. [`GitCommandGateway`] shells out to the local `git`
//! binary; tests use the in-memory simulation in [`crate::fakes`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{GitIdentity, DEFAULT_CONTENT_BRANCH, DEFAULT_PUSH_BRANCH};
use crate::error::GatewayError;

/// Outcome classification of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    Success,
    NoChanges,
}

/// Result of one `commit_and_push` invocation. Returned to the caller,
/// never retained by the gateway.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommitResult {
    pub status: CommitStatus,
    /// Porcelain status lines of everything that went into the commit.
    pub changed_paths: Vec<String>,
    pub timestamp: String,
}

/// Result of pushing static build output to its branch.
#[derive(Debug, Clone)]
pub struct PushResult {
    pub success: bool,
    pub message: String,
    pub commit_sha: Option<String>,
}

/// Async contract for version-control operations.
///
/// One implementation invokes the local tool; the in-memory one in
/// [`crate::fakes`] simulates repository state so tests never need a real
/// repository.
#[async_trait]
pub trait VersionControlGateway: Send + Sync {
    /// Stage everything, commit with `message` and push to the sync branch.
    /// A clean working tree returns `CommitStatus::NoChanges` without ever
    /// creating an empty commit.
    async fn commit_and_push(
        &self,
        message: &str,
        token: Option<&str>,
    ) -> Result<CommitResult, GatewayError>;

    /// Report the underlying tool's version string.
    async fn health_check(&self) -> Result<String, GatewayError>;

    /// Fetch the content branch and merge it into the current branch.
    async fn pull_latest_content(&self) -> Result<(), GatewayError>;

    /// Commit and push the static build output to `branch`.
    async fn push_static_output(&self, branch: &str) -> Result<PushResult, GatewayError>;

    /// Whether `branch` resolves in the working repository.
    async fn branch_exists(&self, branch: &str) -> Result<bool, GatewayError>;
}

/// Bounded retry for network-flavoured push failures.
const MAX_PUSH_RETRIES: u32 = 3;
const PUSH_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Gateway implementation shelling out to the local `git` binary.
pub struct GitCommandGateway {
    workdir: PathBuf,
    identity: GitIdentity,
    push_branch: String,
    content_branch: String,
}

impl GitCommandGateway {
    pub fn new(workdir: PathBuf, identity: GitIdentity) -> Self {
        Self {
            workdir,
            identity,
            push_branch: DEFAULT_PUSH_BRANCH.to_string(),
            content_branch: DEFAULT_CONTENT_BRANCH.to_string(),
        }
    }

    /// Run one git command, capturing stdout. Only the subcommand is logged
    /// so credential-bearing arguments never reach the logs.
    async fn run_git(&self, args: &[&str]) -> Result<String, GatewayError> {
        let subcommand = args.first().copied().unwrap_or("");
        debug!(subcommand, "Running git command");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| GatewayError::Spawn {
                command: format!("git {subcommand}"),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            if !stderr.is_empty() {
                debug!(subcommand, stderr = %stderr, "git command wrote to stderr");
            }
            return Ok(stdout);
        }

        error!(subcommand, stderr = %stderr, "git command failed");
        Err(classify_failure(subcommand, stderr))
    }

    /// Idempotent repository initialisation. `git init` on an existing
    /// repository reinitialises and exits zero, so this never fails for
    /// "already initialized".
    async fn ensure_initialised(&self) -> Result<(), GatewayError> {
        self.run_git(&["init"]).await.map(|_| ())
    }

    /// Configure committer identity. Failure here is fatal for the whole
    /// operation: staging or committing without identity is never attempted.
    async fn configure_identity(&self) -> Result<(), GatewayError> {
        self.run_git(&["config", "--local", "init.defaultBranch", "main"])
            .await?;
        self.run_git(&["config", "--local", "user.name", &self.identity.name])
            .await?;
        self.run_git(&["config", "--local", "user.email", &self.identity.email])
            .await?;
        Ok(())
    }

    /// Configure the basic-auth extraheader for the remote before any
    /// network operation. The raw token is encoded and never logged.
    async fn configure_credential(&self, token: &str) -> Result<(), GatewayError> {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("x-access-token:{token}"));
        let header = format!("AUTHORIZATION: basic {encoded}");
        self.run_git(&[
            "config",
            "--local",
            "http.https://github.com/.extraheader",
            &header,
        ])
        .await?;
        info!("Remote credential configured");
        Ok(())
    }

    /// Push to the sync branch; when the branch does not exist remotely,
    /// create it and push with upstream tracking instead of failing.
    async fn push_with_fallback(&self, branch: &str) -> Result<(), GatewayError> {
        match self.run_git(&["push", "origin", branch]).await {
            Ok(_) => {
                info!(branch, "Pushed to existing branch");
                Ok(())
            }
            Err(first_err) => {
                info!(branch, "Push rejected, creating branch with upstream tracking");
                // The local branch may already exist; checkout failure is
                // tolerated as long as the tracked push succeeds.
                if let Err(e) = self.run_git(&["checkout", "-b", branch]).await {
                    debug!(branch, error = %e, "Branch checkout skipped");
                }
                match self.run_git(&["push", "-u", "origin", branch]).await {
                    Ok(_) => {
                        info!(branch, "Created and pushed new branch");
                        Ok(())
                    }
                    Err(_) => Err(first_err),
                }
            }
        }
    }
}

#[async_trait]
impl VersionControlGateway for GitCommandGateway {
    async fn commit_and_push(
        &self,
        message: &str,
        token: Option<&str>,
    ) -> Result<CommitResult, GatewayError> {
        let timestamp = chrono::Utc::now().to_rfc3339();

        self.ensure_initialised().await?;
        self.configure_identity().await?;
        if let Some(token) = token {
            self.configure_credential(token).await?;
        }

        let status = self.run_git(&["status", "--porcelain"]).await?;
        if status.is_empty() {
            info!("Working tree clean, no commit created");
            return Ok(CommitResult {
                status: CommitStatus::NoChanges,
                changed_paths: vec![],
                timestamp,
            });
        }

        let changed_paths: Vec<String> = status.lines().map(str::to_string).collect();
        info!(changes = changed_paths.len(), "Staging and committing changes");

        self.run_git(&["add", "-A"]).await?;
        self.run_git(&["commit", "-m", message]).await?;
        self.push_with_fallback(&self.push_branch).await?;

        Ok(CommitResult {
            status: CommitStatus::Success,
            changed_paths,
            timestamp,
        })
    }

    async fn health_check(&self) -> Result<String, GatewayError> {
        self.run_git(&["--version"]).await
    }

    async fn pull_latest_content(&self) -> Result<(), GatewayError> {
        let refspec = format!("{0}:{0}", self.content_branch);
        self.run_git(&["fetch", "origin", &refspec]).await?;
        let merge_message = format!(
            "Merge content updates from {} branch",
            self.content_branch
        );
        self.run_git(&["merge", "--no-ff", &self.content_branch, "-m", &merge_message])
            .await?;
        info!(branch = %self.content_branch, "Merged latest content");
        Ok(())
    }

    async fn push_static_output(&self, branch: &str) -> Result<PushResult, GatewayError> {
        let message = format!(
            "Update static build\nTimestamp: {}\nBranch: {}",
            chrono::Utc::now().to_rfc3339(),
            branch
        );
        self.run_git(&["add", "-A", "-f"]).await?;
        // A rebuild with identical output is not an error.
        if let Err(e) = self.run_git(&["commit", "-m", &message]).await {
            warn!(error = %e, "Static output commit skipped (nothing to commit)");
        }

        let mut attempt = 0;
        loop {
            match self.push_with_fallback(branch).await {
                Ok(()) => {
                    let sha = self.run_git(&["rev-parse", "HEAD"]).await.ok();
                    return Ok(PushResult {
                        success: true,
                        message: format!("Successfully pushed to {branch}"),
                        commit_sha: sha,
                    });
                }
                Err(e) if e.is_retryable() && attempt < MAX_PUSH_RETRIES => {
                    attempt += 1;
                    warn!(branch, attempt, error = %e, "Push failed, retrying");
                    tokio::time::sleep(PUSH_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, GatewayError> {
        match self.run_git(&["rev-parse", "--verify", branch]).await {
            Ok(_) => Ok(true),
            Err(GatewayError::Execution { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Map a failed command to the taxonomy by sniffing the stderr text.
fn classify_failure(subcommand: &str, stderr: String) -> GatewayError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("authentication failed")
        || lowered.contains("401")
        || lowered.contains("403")
        || lowered.contains("permission denied")
    {
        GatewayError::Authentication(stderr)
    } else if lowered.contains("could not resolve host")
        || lowered.contains("unable to access")
        || lowered.contains("timed out")
        || lowered.contains("connection refused")
    {
        GatewayError::Network(stderr)
    } else {
        GatewayError::Execution {
            command: format!("git {subcommand}"),
            stderr,
        }
    }
}
