//! Post-build artifact removal.
//!
//! Tasks run independently in declaration order; a required task's failure
//! is accumulated and fails the whole cleanup, an optional task's failure is
//! logged and skipped. Every task is idempotent: cleaning an already-clean
//! workspace is a no-op, not an error.

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Outcome of one cleanup pass. Never an error across the public contract.
#[derive(Debug, Clone)]
pub struct CleanupResult {
    pub success: bool,
    pub message: String,
    pub details: Option<Vec<String>>,
}

type TaskAction = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

/// A single named cleanup step.
pub struct CleanupTask {
    pub name: String,
    pub action: TaskAction,
    pub required: bool,
}

impl CleanupTask {
    pub fn new(
        name: impl Into<String>,
        required: bool,
        action: impl Fn() -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
            required,
        }
    }
}

/// Runs the static ordered task list after builds.
pub struct CleanupCoordinator {
    tasks: Vec<CleanupTask>,
}

impl CleanupCoordinator {
    pub fn new(tasks: Vec<CleanupTask>) -> Self {
        Self { tasks }
    }

    /// Default task set: build output and framework cache are required,
    /// leftover temp files are optional.
    pub fn for_workdir(workdir: &Path) -> Self {
        let out_dir = workdir.join("out");
        let cache_dir = workdir.join(".next");
        let temp_paths: Vec<PathBuf> = [".temp-build", ".export-temp"]
            .iter()
            .map(|p| workdir.join(p))
            .collect();

        Self::new(vec![
            CleanupTask::new("Build output directory", true, move || {
                remove_if_exists(&out_dir)
            }),
            CleanupTask::new("Framework cache", true, move || {
                remove_if_exists(&cache_dir)
            }),
            CleanupTask::new("Temporary files", false, move || {
                for path in &temp_paths {
                    remove_if_exists(path)?;
                }
                Ok(())
            }),
        ])
    }

    /// Execute all tasks; aggregate required failures into the result.
    pub fn cleanup(&self, branch: &str) -> CleanupResult {
        info!(branch, "Starting post-build cleanup");
        let mut failures: Vec<String> = Vec::new();

        for task in &self.tasks {
            info!(task = %task.name, "Executing cleanup task");
            if let Err(e) = (task.action)() {
                let detail = format!("Failed to cleanup {}: {e}", task.name);
                if task.required {
                    error!(task = %task.name, error = %e, "Required cleanup task failed");
                    failures.push(detail);
                } else {
                    warn!(task = %task.name, error = %e, "Optional cleanup task failed, skipping");
                }
            }
        }

        if !failures.is_empty() {
            return CleanupResult {
                success: false,
                message: "Critical cleanup tasks failed".to_string(),
                details: Some(failures),
            };
        }

        info!(branch, "Cleanup completed successfully");
        CleanupResult {
            success: true,
            message: "Cleanup completed successfully".to_string(),
            details: None,
        }
    }
}

/// Remove a file or directory when present; absence is success.
fn remove_if_exists(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| format!("{}: {e}", path.display()))
}
