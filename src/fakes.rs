//! In-memory version-control simulation for tests.
//!
//! Simulates a working tree, a commit log and remote branches so the
//! pipeline can be exercised without a real repository or network. Failure
//! modes (missing credentials, flaky pushes) are scripted per instance.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::DEFAULT_PUSH_BRANCH;
use crate::error::GatewayError;
use crate::gateway::{CommitResult, CommitStatus, PushResult, VersionControlGateway};

/// One simulated commit.
#[derive(Debug, Clone)]
pub struct FakeCommit {
    pub sha: String,
    pub message: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Default)]
struct FakeRepoState {
    dirty_paths: Vec<String>,
    commits: Vec<FakeCommit>,
    remote_branches: HashSet<String>,
    /// Branch names recorded per push attempt, in order.
    push_attempts: Vec<String>,
    /// Remaining scripted network failures for push operations.
    failing_pushes: u32,
    require_token: bool,
    content_pulls: u32,
}

/// Gateway double holding all repository state in memory.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<FakeRepoState>,
    push_branch: String,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeRepoState::default()),
            push_branch: DEFAULT_PUSH_BRANCH.to_string(),
        }
    }

    /// Mark a path as modified in the simulated working tree.
    pub fn touch(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .dirty_paths
            .push(format!(" M {path}"));
    }

    /// Pretend the remote already has `branch`.
    pub fn add_remote_branch(&self, branch: &str) {
        self.state
            .lock()
            .unwrap()
            .remote_branches
            .insert(branch.to_string());
    }

    /// Script the next `n` push operations to fail with a network error.
    pub fn fail_next_pushes(&self, n: u32) {
        self.state.lock().unwrap().failing_pushes = n;
    }

    /// Reject credential-requiring operations when no token is supplied.
    pub fn require_token(&self) {
        self.state.lock().unwrap().require_token = true;
    }

    pub fn commits(&self) -> Vec<FakeCommit> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn push_attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().push_attempts.clone()
    }

    pub fn remote_branches(&self) -> HashSet<String> {
        self.state.lock().unwrap().remote_branches.clone()
    }

    pub fn content_pulls(&self) -> u32 {
        self.state.lock().unwrap().content_pulls
    }

    fn push_to(state: &mut FakeRepoState, branch: &str) -> Result<(), GatewayError> {
        state.push_attempts.push(branch.to_string());
        if state.failing_pushes > 0 {
            state.failing_pushes -= 1;
            return Err(GatewayError::Network("simulated network failure".into()));
        }
        // Branch-create-on-demand: an unknown remote branch is created, not
        // an error.
        state.remote_branches.insert(branch.to_string());
        Ok(())
    }
}

#[async_trait]
impl VersionControlGateway for InMemoryGateway {
    async fn commit_and_push(
        &self,
        message: &str,
        token: Option<&str>,
    ) -> Result<CommitResult, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let timestamp = chrono::Utc::now().to_rfc3339();

        if state.require_token && token.is_none() {
            return Err(GatewayError::Authentication(
                "token required by remote".into(),
            ));
        }

        if state.dirty_paths.is_empty() {
            return Ok(CommitResult {
                status: CommitStatus::NoChanges,
                changed_paths: vec![],
                timestamp,
            });
        }

        let changed_paths = std::mem::take(&mut state.dirty_paths);
        state.commits.push(FakeCommit {
            sha: Uuid::new_v4().simple().to_string(),
            message: message.to_string(),
            paths: changed_paths.clone(),
        });

        // The commit stays recorded even when the push fails, as with the
        // real tool.
        let branch = self.push_branch.clone();
        Self::push_to(&mut state, &branch)?;

        Ok(CommitResult {
            status: CommitStatus::Success,
            changed_paths,
            timestamp,
        })
    }

    async fn health_check(&self) -> Result<String, GatewayError> {
        Ok("git version 0.0.0 (in-memory)".to_string())
    }

    async fn pull_latest_content(&self) -> Result<(), GatewayError> {
        self.state.lock().unwrap().content_pulls += 1;
        Ok(())
    }

    async fn push_static_output(&self, branch: &str) -> Result<PushResult, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let sha = Uuid::new_v4().simple().to_string();
        state.commits.push(FakeCommit {
            sha: sha.clone(),
            message: format!("Update static build for {branch}"),
            paths: vec![],
        });
        Self::push_to(&mut state, branch)?;
        Ok(PushResult {
            success: true,
            message: format!("Successfully pushed to {branch}"),
            commit_sha: Some(sha),
        })
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, GatewayError> {
        Ok(self.state.lock().unwrap().remote_branches.contains(branch))
    }
}
