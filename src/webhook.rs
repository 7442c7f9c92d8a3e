//! Webhook intake validation for the build trigger path.
//!
//! Incoming requests carry a shared-secret signature header and an event
//! type header; payloads are either provider push events or a manual
//! trigger `{ "manual": true, "branch": "..." }`. Manual triggers bypass
//! content inspection but still require a branch.

use serde_json::Value;
use thiserror::Error;
use tracing::info;

/// Event types the build pipeline reacts to.
const ACCEPTED_EVENTS: [&str; 2] = ["push", "repository"];

/// Validation failures, each mapped to the HTTP status the boundary returns.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing webhook signature")]
    MissingSignature,
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Missing event type")]
    MissingEvent,
    #[error("Invalid webhook event type: {0}")]
    InvalidEvent(String),
    #[error("Missing webhook payload")]
    MissingPayload,
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

impl WebhookError {
    pub fn status(&self) -> u16 {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => 401,
            _ => 400,
        }
    }
}

/// Result of payload validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadValidation {
    /// Branch named by a manual trigger, absent for provider events.
    pub manual_branch: Option<String>,
    /// Whether the commit touches CMS schema or configuration files.
    pub is_schema_change: bool,
}

/// Stateless validator for webhook headers and payloads.
pub struct WebhookValidator;

impl WebhookValidator {
    /// Check the signature and event headers against the shared secret.
    pub fn validate_headers(
        signature: Option<&str>,
        event: Option<&str>,
        secret: &str,
    ) -> Result<(), WebhookError> {
        info!("Validating webhook request");

        let signature = signature.ok_or(WebhookError::MissingSignature)?;
        let event = event.ok_or(WebhookError::MissingEvent)?;

        if signature != secret {
            return Err(WebhookError::InvalidSignature);
        }
        if !ACCEPTED_EVENTS.contains(&event) {
            return Err(WebhookError::InvalidEvent(event.to_string()));
        }

        info!(event, "Webhook validation successful");
        Ok(())
    }

    /// Validate the payload shape and classify the change.
    pub fn validate_payload(payload: &Value) -> Result<PayloadValidation, WebhookError> {
        if payload.is_null() {
            return Err(WebhookError::MissingPayload);
        }

        // Manual trigger: requires a branch, treated as a schema change so a
        // full rebuild runs.
        if payload.get("manual").and_then(Value::as_bool) == Some(true) {
            let branch = payload
                .get("branch")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    WebhookError::InvalidPayload("missing branch in manual build payload".into())
                })?;
            return Ok(PayloadValidation {
                manual_branch: Some(branch.to_string()),
                is_schema_change: true,
            });
        }

        if payload.get("ref").is_none() && payload.get("repository").is_none() {
            return Err(WebhookError::InvalidPayload(
                "missing ref and repository fields".into(),
            ));
        }

        let is_schema_change = payload
            .get("commits")
            .and_then(Value::as_array)
            .map(|commits| commits.iter().any(commit_touches_schema))
            .unwrap_or(false);

        info!(is_schema_change, "Webhook payload validation successful");
        Ok(PayloadValidation {
            manual_branch: None,
            is_schema_change,
        })
    }
}

/// Whether a commit's file lists touch CMS schema or configuration paths.
fn commit_touches_schema(commit: &Value) -> bool {
    ["added", "modified", "removed"]
        .iter()
        .filter_map(|key| commit.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .any(|file| {
            file.starts_with("tina/")
                || file.contains("schema.")
                || file.contains("config.")
                || file.ends_with(".schema.json")
                || file.ends_with(".graphql")
        })
}
