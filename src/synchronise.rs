//! Client-side commit synchroniser: periodic change detection, best-effort
//! local persistence, debounced remote commits with retry/backoff.
//!
//! The synchroniser runs one cooperative timer loop per instance. Restarting
//! clears the previous loop first; stopping cancels the loop and any pending
//! retry sleep, checked at every suspension point. Remote calls go through
//! the [`CommitEndpoint`] seam so tests never need a live server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::config::SyncSettings;
use crate::snapshot::SnapshotStore;
use crate::tracker::{canonical_json, ChangeTracker};

/// Backoff ceiling for commit retries.
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Per-attempt commit request. Immutable once constructed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommitRequest {
    pub message: String,
    pub timestamp: String,
}

impl CommitRequest {
    /// Generated message for a periodic save, timestamped at construction.
    pub fn periodic() -> Self {
        Self {
            message: "Auto-commit: Periodic save of changes".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Server response to a commit request.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CommitResponse {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Remote seam the synchroniser talks through.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommitEndpoint: Send + Sync {
    async fn commit(
        &self,
        request: &CommitRequest,
    ) -> Result<CommitResponse, Box<dyn std::error::Error + Send + Sync>>;
}

/// HTTP implementation posting to the server's `/sync/commit`.
pub struct HttpCommitEndpoint {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCommitEndpoint {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl CommitEndpoint for HttpCommitEndpoint {
    async fn commit(
        &self,
        request: &CommitRequest,
    ) -> Result<CommitResponse, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/sync/commit", self.base_url.trim_end_matches('/'));
        let mut req = self.client.post(&url).json(request);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("commit endpoint returned {status}: {body}").into());
        }
        Ok(response.json::<CommitResponse>().await?)
    }
}

/// Mutable synchroniser state. In-memory only, never persisted.
#[derive(Debug, Default)]
pub struct SyncState {
    pub last_sync_at: Option<Instant>,
    pub retry_count: u32,
}

/// Outcome of one sync cycle, surfaced to the caller/UI.
#[derive(Debug)]
pub enum SyncOutcome {
    /// State identical to the last recorded snapshot; no remote call made.
    Unchanged,
    /// Data changed but the debounce window has not elapsed.
    Debounced,
    /// Remote commit succeeded.
    Synced(CommitResponse),
    /// Retry budget exhausted; the next periodic tick starts fresh.
    TerminalFailure { attempts: u32, error: String },
    /// The synchroniser was stopped mid-cycle.
    Cancelled,
}

/// Debounced, retrying commit trigger.
pub struct CommitSynchroniser {
    settings: SyncSettings,
    endpoint: Arc<dyn CommitEndpoint>,
    store: SnapshotStore,
    tracker: Mutex<ChangeTracker>,
    state: Mutex<SyncState>,
    cancel_tx: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CommitSynchroniser {
    pub fn new(settings: SyncSettings, endpoint: Arc<dyn CommitEndpoint>) -> Self {
        let store = SnapshotStore::new(settings.snapshot_path.clone());
        // The comparator starts empty on purpose. The store holds the latest
        // local data, not what the remote has seen; seeding the tracker from
        // it would make a restart treat a terminally failed sync as done.
        Self {
            settings,
            endpoint,
            store,
            tracker: Mutex::new(ChangeTracker::new()),
            state: Mutex::new(SyncState::default()),
            cancel_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Start the periodic loop. The first attempt runs immediately; the
    /// interval is not awaited before the first check. Restarting clears any
    /// prior timer first.
    pub fn start<F>(self: &Arc<Self>, source: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.stop();

        let (tx, mut rx) = watch::channel(false);
        *self.cancel_tx.lock().unwrap() = Some(tx);

        let this = Arc::clone(self);
        let interval_ms = self.settings.interval_ms;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms, "Commit synchroniser started");
            loop {
                tokio::select! {
                    _ = rx.changed() => {
                        info!("Commit synchroniser stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let candidate = source();
                        match this.sync_cycle(&candidate).await {
                            SyncOutcome::Unchanged => debug!("No changes detected this tick"),
                            SyncOutcome::Debounced => debug!("Remote sync debounced"),
                            SyncOutcome::Synced(resp) => {
                                info!(status = %resp.status, changes = resp.changes.len(), "Auto-sync succeeded");
                            }
                            SyncOutcome::TerminalFailure { attempts, error } => {
                                error!(attempts, error = %error, "Auto-sync failed terminally for this cycle");
                            }
                            SyncOutcome::Cancelled => break,
                        }
                    }
                }
            }
        });
        *self.task.lock().unwrap() = Some(handle);
    }

    /// Cancel the timer loop and any pending retry. No further remote calls
    /// are made after this returns.
    pub fn stop(&self) {
        if let Some(tx) = self.cancel_tx.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// One full cycle: change check, local persist, debounce, remote commit
    /// with exponential-backoff retries. The retry counter starts fresh each
    /// cycle.
    pub async fn sync_cycle(&self, candidate: &Value) -> SyncOutcome {
        let serialized = match canonical_json(candidate) {
            Ok(s) => s,
            Err(e) => {
                error!(error = ?e, "Failed to serialize state, skipping cycle");
                return SyncOutcome::Unchanged;
            }
        };

        if !self.tracker.lock().unwrap().has_changed(candidate) {
            return SyncOutcome::Unchanged;
        }

        // Local persistence first: a failed remote sync must never lose the
        // latest snapshot. Failures are logged, non-fatal.
        if !self.store.save(&serialized) {
            warn!("Local snapshot persist failed, continuing with remote sync");
        }

        // Debounce: skip the remote call inside the window. Scheduled
        // retries below bypass this check by staying inside the cycle.
        let interval = Duration::from_millis(self.settings.interval_ms);
        {
            let mut state = self.state.lock().unwrap();
            state.retry_count = 0;
            if let Some(last) = state.last_sync_at {
                if last.elapsed() < interval {
                    return SyncOutcome::Debounced;
                }
            }
        }

        let mut attempts: u32 = 0;
        loop {
            let request = CommitRequest::periodic();
            match self.endpoint.commit(&request).await {
                Ok(response) => {
                    {
                        let mut state = self.state.lock().unwrap();
                        state.last_sync_at = Some(Instant::now());
                        state.retry_count = 0;
                    }
                    self.tracker.lock().unwrap().record(candidate);
                    return SyncOutcome::Synced(response);
                }
                Err(e) => {
                    attempts += 1;
                    self.state.lock().unwrap().retry_count = attempts;
                    if attempts > self.settings.max_retries {
                        return SyncOutcome::TerminalFailure {
                            attempts: attempts - 1,
                            error: e.to_string(),
                        };
                    }
                    let delay = retry_delay_ms(attempts - 1);
                    warn!(
                        attempt = attempts,
                        delay_ms = delay,
                        error = %e,
                        "Remote sync failed, retrying"
                    );
                    if self.wait_or_cancel(Duration::from_millis(delay)).await {
                        return SyncOutcome::Cancelled;
                    }
                }
            }
        }
    }

    /// Sleep for `delay`, returning `true` when the synchroniser was stopped
    /// during the wait.
    async fn wait_or_cancel(&self, delay: Duration) -> bool {
        let rx = self
            .cancel_tx
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.subscribe());
        match rx {
            Some(mut rx) => tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                _ = rx.changed() => true,
            },
            None => {
                tokio::time::sleep(delay).await;
                false
            }
        }
    }

    /// Retry counter as currently recorded. Exposed for the UI layer.
    pub fn retry_count(&self) -> u32 {
        self.state.lock().unwrap().retry_count
    }
}

/// Exponential backoff with a 30s ceiling.
pub fn retry_delay_ms(attempt: u32) -> u64 {
    let base = 1000u64.saturating_mul(1u64 << attempt.min(16));
    base.min(MAX_RETRY_DELAY_MS)
}
