//! Best-effort local persistence of the latest state snapshot.
//!
//! Stand-in for the browser-local storage of the original editor: the
//! synchroniser writes the serialized snapshot here on every save so a
//! failed remote sync never loses the latest data. Save failures are
//! logged and must not fail the sync cycle.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// File-backed snapshot store.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Persist the serialized snapshot. Returns whether the write succeeded;
    /// callers treat `false` as a logged warning, not an error.
    pub fn save(&self, serialized: &str) -> bool {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!(error = ?e, path = %parent.display(), "Failed to create snapshot directory");
                    return false;
                }
            }
        }
        match fs::write(&self.path, serialized) {
            Ok(()) => {
                debug!(path = %self.path.display(), bytes = serialized.len(), "Snapshot persisted");
                true
            }
            Err(e) => {
                error!(error = ?e, path = %self.path.display(), "Failed to persist snapshot");
                false
            }
        }
    }

    /// Load the previously persisted snapshot, if one exists and is readable.
    pub fn load(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                info!(path = %self.path.display(), "Loaded persisted snapshot");
                Some(contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                error!(error = ?e, path = %self.path.display(), "Failed to read persisted snapshot");
                None
            }
        }
    }
}
