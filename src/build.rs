//! Branch-specific build orchestration: preservation, command execution,
//! output validation, static export and the surrounding notifications.
//!
//! Operational failures come back as a structured [`BuildResult`] so the
//! request handler can react without crashing; only an unknown branch is a
//! hard error. Notification delivery failures are swallowed by the
//! dispatcher and never abort a build.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::process::Command;
use tracing::{error, info, warn};

use crate::cleanup::CleanupCoordinator;
use crate::config::{BranchConfig, DEFAULT_STATIC_BRANCH};
use crate::error::SyncError;
use crate::gateway::VersionControlGateway;
use crate::notify::{BuildNotification, NotificationDispatcher, NotificationStatus};

/// One build invocation's outcome. Passed to the dispatcher and discarded.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildResult {
    pub success: bool,
    pub branch: String,
    pub timestamp: String,
    pub message: String,
    pub details: Option<String>,
}

/// Outcome of pre-build branch validation.
#[derive(Debug, Clone)]
pub struct BranchValidation {
    pub is_valid: bool,
    pub message: String,
    pub details: Vec<String>,
}

/// Coordinates builds for the configured branches.
pub struct BuildOrchestrator {
    workdir: PathBuf,
    branches: HashMap<String, BranchConfig>,
    gateway: std::sync::Arc<dyn VersionControlGateway>,
    notifier: std::sync::Arc<NotificationDispatcher>,
    cleanup: CleanupCoordinator,
    static_branch: String,
    last_export_at: Mutex<Option<String>>,
}

impl BuildOrchestrator {
    pub fn new(
        workdir: PathBuf,
        branches: HashMap<String, BranchConfig>,
        gateway: std::sync::Arc<dyn VersionControlGateway>,
        notifier: std::sync::Arc<NotificationDispatcher>,
        cleanup: CleanupCoordinator,
    ) -> Self {
        Self {
            workdir,
            branches,
            gateway,
            notifier,
            cleanup,
            static_branch: DEFAULT_STATIC_BRANCH.to_string(),
            last_export_at: Mutex::new(None),
        }
    }

    pub fn last_export_at(&self) -> Option<String> {
        self.last_export_at.lock().unwrap().clone()
    }

    /// Confirm the branch is configured and resolves in the repository.
    pub async fn validate_branch(&self, branch: &str) -> BranchValidation {
        if !self.branches.contains_key(branch) {
            let known: Vec<&String> = self.branches.keys().collect();
            return BranchValidation {
                is_valid: false,
                message: format!("Invalid branch: {branch}"),
                details: vec![format!("Branch must be one of: {known:?}")],
            };
        }
        match self.gateway.branch_exists(branch).await {
            Ok(true) => BranchValidation {
                is_valid: true,
                message: format!("Branch {branch} is valid"),
                details: vec![],
            },
            Ok(false) => BranchValidation {
                is_valid: false,
                message: format!("Branch {branch} does not exist"),
                details: vec!["Branch not found in repository".to_string()],
            },
            Err(e) => BranchValidation {
                is_valid: false,
                message: format!("Branch lookup failed: {e}"),
                details: vec![e.to_string()],
            },
        }
    }

    /// Run the build pipeline for `branch`.
    ///
    /// Fails with [`SyncError::UnknownBranch`] when no configuration exists;
    /// all operational failures come back as `BuildResult { success: false }`
    /// with a failure notification already dispatched.
    pub async fn build(&self, branch: &str) -> Result<BuildResult, SyncError> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let config = self
            .branches
            .get(branch)
            .ok_or_else(|| SyncError::UnknownBranch(branch.to_string()))?
            .clone();

        info!(branch, command = %config.build_command, "Starting build");

        let preserved = self.preserve_paths(&config);

        if let Err(e) = self.run_build_command(&config.build_command).await {
            self.restore_paths(&config, preserved.as_ref());
            return Ok(self
                .fail(branch, &timestamp, "Build Process Failed", e.to_string())
                .await);
        }

        self.restore_paths(&config, preserved.as_ref());

        if let Err(missing) = self.validate_output(&config) {
            let detail = format!(
                "Failed to validate build output in {}: missing {missing:?}",
                config.output_dir.display()
            );
            return Ok(self
                .fail(branch, &timestamp, "Build Validation Failed", detail)
                .await);
        }

        // Only the static output branch gets its artifacts pushed.
        if branch == self.static_branch {
            if let Err(e) = self.gateway.push_static_output(branch).await {
                return Ok(self
                    .fail(branch, &timestamp, "Build Process Failed", e.to_string())
                    .await);
            }
        }

        self.notifier
            .send_build_notification(&BuildNotification {
                status: NotificationStatus::Success,
                title: "Build Completed Successfully".to_string(),
                message: format!("Branch: {branch}\nBuild and validation completed successfully"),
                branch: Some(branch.to_string()),
                details: None,
                timestamp: Some(timestamp.clone()),
            })
            .await;

        Ok(BuildResult {
            success: true,
            branch: branch.to_string(),
            timestamp,
            message: format!("Build completed successfully for {branch} branch"),
            details: None,
        })
    }

    /// Static export: content pull-and-merge, build, cleanup. Cleanup issues
    /// are warnings, never operation failures.
    pub async fn export(&self) -> Result<BuildResult, SyncError> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let branch = self.static_branch.clone();

        if let Err(e) = self.gateway.pull_latest_content().await {
            return Ok(self
                .fail(&branch, &timestamp, "Static Export Failed", e.to_string())
                .await);
        }

        let build_result = self.build(&branch).await?;
        if !build_result.success {
            return Ok(self
                .fail(
                    &branch,
                    &timestamp,
                    "Static Export Failed",
                    "Build failed before export".to_string(),
                )
                .await);
        }

        let cleanup_result = self.cleanup.cleanup(&branch);
        if !cleanup_result.success {
            warn!(message = %cleanup_result.message, "Cleanup had issues");
        }

        *self.last_export_at.lock().unwrap() = Some(timestamp.clone());

        self.notifier
            .send_build_notification(&BuildNotification {
                status: NotificationStatus::Success,
                title: "Static Export Completed".to_string(),
                message: "Static export process completed successfully".to_string(),
                branch: Some(branch.clone()),
                details: Some(vec![
                    "Static files generated and pushed to the output branch".to_string(),
                ]),
                timestamp: Some(timestamp.clone()),
            })
            .await;

        Ok(BuildResult {
            success: true,
            branch,
            timestamp,
            message: "Static export completed successfully".to_string(),
            details: None,
        })
    }

    async fn fail(
        &self,
        branch: &str,
        timestamp: &str,
        title: &str,
        detail: String,
    ) -> BuildResult {
        error!(branch, detail = %detail, "Build pipeline failed");
        self.notifier
            .send_build_notification(&BuildNotification {
                status: NotificationStatus::Failure,
                title: title.to_string(),
                message: format!("Branch: {branch}\n{title}"),
                branch: Some(branch.to_string()),
                details: Some(vec![detail.clone()]),
                timestamp: Some(timestamp.to_string()),
            })
            .await;
        BuildResult {
            success: false,
            branch: branch.to_string(),
            timestamp: timestamp.to_string(),
            message: title.to_string(),
            details: Some(detail),
        }
    }

    /// Run the configured build command through the shell, streaming output
    /// to the parent's stdio.
    async fn run_build_command(&self, command: &str) -> Result<(), SyncError> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .status()
            .await
            .map_err(|e| SyncError::Execution {
                command: command.to_string(),
                detail: format!("failed to launch: {e}"),
            })?;

        if !status.success() {
            return Err(SyncError::Execution {
                command: command.to_string(),
                detail: format!("exit code {:?}", status.code()),
            });
        }
        Ok(())
    }

    /// Output is valid only when the directory exists, is non-empty and all
    /// required paths are present, regardless of the command's exit code.
    fn validate_output(&self, config: &BranchConfig) -> Result<(), Vec<String>> {
        let output_dir = self.workdir.join(&config.output_dir);
        if !output_dir.exists() {
            return Err(vec![format!("{}", config.output_dir.display())]);
        }
        match std::fs::read_dir(&output_dir) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    return Err(vec!["<empty output directory>".to_string()]);
                }
            }
            Err(e) => return Err(vec![format!("unreadable output directory: {e}")]),
        }

        let missing: Vec<String> = config
            .required_paths
            .iter()
            .filter(|p| !output_dir.join(p).exists())
            .map(|p| p.display().to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Copy preserved paths to a temp dir. Best-effort: failures are logged
    /// and the build continues.
    fn preserve_paths(&self, config: &BranchConfig) -> Option<tempfile::TempDir> {
        if config.preserved_paths.is_empty() {
            return None;
        }
        let temp = match tempfile::tempdir() {
            Ok(t) => t,
            Err(e) => {
                error!(error = ?e, "Failed to create preservation directory");
                return None;
            }
        };
        for path in &config.preserved_paths {
            let source = self.workdir.join(path);
            if !source.is_file() {
                continue;
            }
            let target = temp.path().join(flatten_name(path));
            if let Err(e) = std::fs::copy(&source, &target) {
                error!(error = ?e, path = %path.display(), "Error preserving file");
            }
        }
        Some(temp)
    }

    /// Restore preserved paths. Best-effort, mirroring preservation.
    fn restore_paths(&self, config: &BranchConfig, preserved: Option<&tempfile::TempDir>) {
        let Some(temp) = preserved else { return };
        for path in &config.preserved_paths {
            let source = temp.path().join(flatten_name(path));
            if !source.is_file() {
                continue;
            }
            let target = self.workdir.join(path);
            if let Some(parent) = target.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::copy(&source, &target) {
                error!(error = ?e, path = %path.display(), "Error restoring file");
            }
        }
    }
}

/// Flatten a relative path into a single file name for the temp dir.
fn flatten_name(path: &Path) -> String {
    path.display().to_string().replace(['/', '\\'], "_")
}
