//! HTTP boundary for the sync and build pipeline.
//!
//! Endpoints:
//! - `GET /sync/health`: version-control availability probe
//! - `POST /sync/commit`: commit-and-push trigger for the synchroniser
//! - `POST /webhook`: signed build trigger (provider events and manual)
//!
//! Concurrent commit or build requests are not serialized here: the
//! underlying tool has no application-level mutual exclusion and the
//! intended usage is a single active editor.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::build::BuildOrchestrator;
use crate::error::GatewayError;
use crate::gateway::{CommitStatus, VersionControlGateway};
use crate::webhook::{WebhookError, WebhookValidator};

/// Signature and event headers checked on webhook intake.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";
pub const EVENT_HEADER: &str = "x-github-event";

/// Shared state behind every handler.
pub struct AppState {
    pub gateway: Arc<dyn VersionControlGateway>,
    pub orchestrator: Arc<BuildOrchestrator>,
    /// Shared secret webhook signatures are compared against.
    pub webhook_secret: Option<String>,
    /// Server-side fallback token when the request carries none.
    pub git_token: Option<String>,
}

/// Build the axum router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sync/health", get(health_handler))
        .route("/sync/commit", post(commit_handler))
        .route("/webhook", post(webhook_handler))
        .with_state(state)
}

/// Owns the bound listener and its graceful-shutdown signal.
pub struct SyncServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: Option<SocketAddr>,
}

impl SyncServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
            addr: None,
        }
    }

    /// Bind and start serving. Returns the bound address.
    pub async fn start(&mut self, bind_addr: &str) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(bind_addr).await?;
        let addr = listener.local_addr()?;
        self.addr = Some(addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = build_router(self.state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %e, "Sync server error");
            }
        });

        info!(%addr, "Sync server listening");
        Ok(addr)
    }

    /// Signal graceful shutdown.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.addr = None;
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

/// `GET /sync/health`
async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.gateway.health_check().await {
        Ok(version) => Json(json!({
            "status": "healthy",
            "message": "Sync endpoint is running",
            "version": version,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Version control tool is not available",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// `POST /sync/commit`
async fn commit_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Value>, axum::extract::rejection::JsonRejection>,
) -> Response {
    info!("Commit request started");

    let body = match body {
        Ok(Json(v)) => v,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "status": "error",
                    "message": "Invalid request body",
                    "error": rejection.body_text(),
                })),
            )
                .into_response();
        }
    };
    let (message, timestamp) = match parse_commit_body(&body) {
        Ok(fields) => fields,
        Err(detail) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "status": "error",
                    "message": "Invalid request body",
                    "error": detail,
                })),
            )
                .into_response();
        }
    };

    let bearer = bearer_token(&headers);
    let token = bearer.as_deref().or(state.git_token.as_deref());
    let commit_message = format!("{message} at {timestamp}");

    match state.gateway.commit_and_push(&commit_message, token).await {
        Ok(result) if result.status == CommitStatus::NoChanges => Json(json!({
            "status": "success",
            "message": "No changes to commit",
            "timestamp": timestamp,
        }))
        .into_response(),
        Ok(result) => Json(json!({
            "status": "success",
            "message": "Changes committed and pushed successfully",
            "timestamp": timestamp,
            "changes": result.changed_paths,
        }))
        .into_response(),
        Err(GatewayError::Authentication(detail)) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "status": "error",
                "message": "No valid authorization token provided",
                "error": detail,
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Commit operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Failed to commit or push changes",
                    "error": e.to_string(),
                    "timestamp": timestamp,
                })),
            )
                .into_response()
        }
    }
}

/// `POST /webhook`
async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Value>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Some(secret) = state.webhook_secret.as_deref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "message": "Webhook secret is not configured",
            })),
        )
            .into_response();
    };

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = WebhookValidator::validate_headers(signature, event, secret) {
        return webhook_error_response(e);
    }

    let payload = match body {
        Ok(Json(v)) => v,
        Err(_) => Value::Null,
    };
    let validation = match WebhookValidator::validate_payload(&payload) {
        Ok(v) => v,
        Err(e) => return webhook_error_response(e),
    };

    // Every build below is a full rebuild, so the schema classification
    // only distinguishes the trigger in the logs.
    info!(
        schema_change = validation.is_schema_change,
        manual = validation.manual_branch.is_some(),
        "Webhook accepted, triggering build"
    );

    // Manual triggers name their branch; provider pushes build the branch
    // named by the ref.
    let branch = validation
        .manual_branch
        .clone()
        .or_else(|| {
            payload
                .get("ref")
                .and_then(Value::as_str)
                .map(|r| r.trim_start_matches("refs/heads/").to_string())
        })
        .unwrap_or_else(|| crate::config::DEFAULT_PUSH_BRANCH.to_string());

    match state.orchestrator.build(&branch).await {
        Ok(result) => {
            let status = if result.success {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(serde_json::to_value(&result).unwrap_or_default())).into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": e.to_string(),
            })),
        )
            .into_response(),
    }
}

fn webhook_error_response(e: WebhookError) -> Response {
    let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::BAD_REQUEST);
    (
        status,
        Json(json!({
            "status": "error",
            "message": e.to_string(),
        })),
    )
        .into_response()
}

/// Extract `message` and `timestamp` with defaults; wrong types are a 400.
fn parse_commit_body(body: &Value) -> Result<(String, String), String> {
    if !body.is_object() {
        return Err("body must be a JSON object".to_string());
    }
    let message = match body.get("message") {
        None | Some(Value::Null) => "Auto-commit changes".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err("message must be a string".to_string()),
    };
    let timestamp = match body.get("timestamp") {
        None | Some(Value::Null) => chrono::Utc::now().to_rfc3339(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err("timestamp must be a string".to_string()),
    };
    Ok((message, timestamp))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}
