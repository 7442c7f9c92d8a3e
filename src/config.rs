use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default branch the auto-commit path pushes to.
pub const DEFAULT_PUSH_BRANCH: &str = "staging";

/// Branch carrying editor content, merged in before an export.
pub const DEFAULT_CONTENT_BRANCH: &str = "cms";

/// Branch receiving the static build output.
pub const DEFAULT_STATIC_BRANCH: &str = "static";

/// Immutable build configuration for one branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Shell command that produces the build output.
    pub build_command: String,
    /// Directory the build writes into, relative to the workdir.
    pub output_dir: PathBuf,
    /// Paths (relative to `output_dir`) that must exist for the build to count.
    pub required_paths: Vec<PathBuf>,
    /// Paths (relative to the workdir) preserved across the build, best-effort.
    #[serde(default)]
    pub preserved_paths: Vec<PathBuf>,
}

/// Settings for the client-side commit synchroniser loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Timer tick and debounce window, in milliseconds.
    pub interval_ms: u64,
    /// Remote retry budget per cycle.
    pub max_retries: u32,
    /// File the latest snapshot is persisted to, best-effort.
    pub snapshot_path: PathBuf,
    /// Base URL of the server exposing `/sync/commit`.
    pub endpoint_url: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            max_retries: 3,
            snapshot_path: PathBuf::from(".site-sync/snapshot.json"),
            endpoint_url: "http://127.0.0.1:3999".to_string(),
        }
    }
}

/// Committer identity configured on the working repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: "site-sync".to_string(),
            email: "site-sync@localhost".to_string(),
        }
    }
}

/// Fully merged runtime configuration: static YAML plus environment secrets.
#[derive(Debug)]
pub struct AppConfig {
    /// Working repository root all commands run in.
    pub workdir: PathBuf,
    /// Address the HTTP boundary binds to.
    pub bind_addr: String,
    pub sync: SyncSettings,
    pub identity: GitIdentity,
    /// Per-branch build configurations, loaded once at startup.
    pub branches: HashMap<String, BranchConfig>,
    /// Optional access token for credentialed remotes. Never logged.
    pub git_token: Option<String>,
    /// Shared secret for webhook intake. Required by `serve`.
    pub webhook_secret: Option<String>,
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            workdir = %self.workdir.display(),
            bind_addr = %self.bind_addr,
            branches = self.branches.len(),
            interval_ms = self.sync.interval_ms,
            token_present = self.git_token.is_some(),
            "Loaded AppConfig"
        );
        debug!(branches = ?self.branches.keys().collect::<Vec<_>>(), "Configured branches");
    }
}

/// Branch map matching the original deployment: framework builds for
/// `main` and `staging`, a static export for `static`.
pub fn default_branch_configs() -> HashMap<String, BranchConfig> {
    let mut branches = HashMap::new();
    branches.insert(
        "main".to_string(),
        BranchConfig {
            build_command: "next build".to_string(),
            output_dir: PathBuf::from(".next"),
            required_paths: vec![PathBuf::from("server/pages"), PathBuf::from("static")],
            preserved_paths: vec![],
        },
    );
    branches.insert(
        "staging".to_string(),
        BranchConfig {
            build_command: "next build".to_string(),
            output_dir: PathBuf::from(".next"),
            required_paths: vec![PathBuf::from("server/pages"), PathBuf::from("static")],
            preserved_paths: vec![],
        },
    );
    branches.insert(
        DEFAULT_STATIC_BRANCH.to_string(),
        BranchConfig {
            build_command: "next build && next export".to_string(),
            output_dir: PathBuf::from("out"),
            required_paths: vec![PathBuf::from("index.html"), PathBuf::from("_next/static")],
            preserved_paths: vec![],
        },
    );
    branches
}
