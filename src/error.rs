//! Typed error taxonomy for the sync and build pipeline.
//!
//! Two enums cover the two subsystems:
//! - `GatewayError`: version-control operations (command execution, auth)
//! - `SyncError`: build orchestration, webhook intake and configuration
//!
//! Every consumer can match exhaustively on the variant instead of probing
//! ad hoc error shapes.

use thiserror::Error;

/// Errors from version-control operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The underlying tool exited non-zero. Carries the stderr text.
    #[error("command `{command}` failed: {stderr}")]
    Execution { command: String, stderr: String },

    /// The remote rejected the operation for missing or bad credentials.
    #[error("authentication required: {0}")]
    Authentication(String),

    /// The remote was unreachable or the transfer failed mid-flight.
    #[error("network failure: {0}")]
    Network(String),

    /// The tool could not be launched at all.
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl GatewayError {
    /// Network-flavoured failures are the only ones worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

/// Errors from the build, webhook and configuration subsystems.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required environment variable or config entry is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No build configuration exists for the requested branch.
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    /// Build output is missing required artifacts.
    #[error("build validation failed: missing {missing:?}")]
    Validation { missing: Vec<String> },

    /// A build command exited non-zero.
    #[error("build command `{command}` failed: {detail}")]
    Execution { command: String, detail: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
