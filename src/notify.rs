//! Build outcome notification fan-out to Slack and Microsoft Teams.
//!
//! Channels are read once from the environment; delivery is fire-and-forget
//! over a [`NotificationSender`] seam so one channel's failure never blocks
//! another and never reaches the caller.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{error, info};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Supported notification platforms, each with its own payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Slack,
    Teams,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Slack => "slack",
            Platform::Teams => "teams",
        }
    }
}

/// One configured delivery channel. Immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub webhook_url: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Success,
    Failure,
    Warning,
}

impl NotificationStatus {
    fn label(&self) -> &'static str {
        match self {
            NotificationStatus::Success => "SUCCESS",
            NotificationStatus::Failure => "FAILURE",
            NotificationStatus::Warning => "WARNING",
        }
    }
}

/// Platform-agnostic build notification content.
#[derive(Debug, Clone)]
pub struct BuildNotification {
    pub status: NotificationStatus,
    pub title: String,
    pub message: String,
    pub branch: Option<String>,
    pub details: Option<Vec<String>>,
    pub timestamp: Option<String>,
}

/// Transport seam for webhook delivery. Mocked in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn deliver(
        &self,
        webhook_url: &str,
        payload: &Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// reqwest-backed sender used in production.
pub struct HttpNotificationSender {
    client: reqwest::Client,
}

impl HttpNotificationSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpNotificationSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn deliver(
        &self,
        webhook_url: &str,
        payload: &Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let response = self.client.post(webhook_url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(format!("webhook returned status {}", response.status()).into());
        }
        Ok(())
    }
}

/// Fans build outcomes out to every configured channel.
pub struct NotificationDispatcher {
    configs: Vec<NotificationConfig>,
    sender: Box<dyn NotificationSender>,
}

impl NotificationDispatcher {
    pub fn new(configs: Vec<NotificationConfig>, sender: Box<dyn NotificationSender>) -> Self {
        Self { configs, sender }
    }

    /// Read channel configuration from the environment. Absent variables are
    /// a no-op; zero channels yields a dispatcher that silently does nothing.
    pub fn from_env(sender: Box<dyn NotificationSender>) -> Self {
        let mut configs = Vec::new();

        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            configs.push(NotificationConfig {
                webhook_url: url,
                platform: Platform::Slack,
            });
            info!("Slack notifications initialized");
        }
        if let Ok(url) = std::env::var("TEAMS_WEBHOOK_URL") {
            configs.push(NotificationConfig {
                webhook_url: url,
                platform: Platform::Teams,
            });
            info!("Teams notifications initialized");
        }

        Self::new(configs, sender)
    }

    pub fn channel_count(&self) -> usize {
        self.configs.len()
    }

    /// Deliver to all channels. Failures are logged per channel and never
    /// propagate to the caller.
    pub async fn send_build_notification(&self, notification: &BuildNotification) {
        let deliveries = self.configs.iter().map(|config| {
            let payload = format_notification(notification, config.platform);
            async move {
                match self.sender.deliver(&config.webhook_url, &payload).await {
                    Ok(()) => {
                        info!(platform = config.platform.as_str(), "Notification sent");
                    }
                    Err(e) => {
                        error!(
                            platform = config.platform.as_str(),
                            error = %e,
                            "Failed to send notification"
                        );
                    }
                }
            }
        });
        join_all(deliveries).await;
    }

    /// Emit one notification per status to verify channel configuration.
    pub async fn send_test_notifications(&self) {
        let timestamp = chrono::Utc::now().to_rfc3339();
        for (status, title, message) in [
            (
                NotificationStatus::Success,
                "Test Notification - Success",
                "This is a test success notification",
            ),
            (
                NotificationStatus::Warning,
                "Test Notification - Warning",
                "This is a test warning notification",
            ),
            (
                NotificationStatus::Failure,
                "Test Notification - Failure",
                "This is a test failure notification",
            ),
        ] {
            self.send_build_notification(&BuildNotification {
                status,
                title: title.to_string(),
                message: message.to_string(),
                branch: Some("test-branch".to_string()),
                details: None,
                timestamp: Some(timestamp.clone()),
            })
            .await;
        }
    }
}

/// Build the platform-specific payload: Slack block kit sections or a Teams
/// adaptive card.
pub fn format_notification(notification: &BuildNotification, platform: Platform) -> Value {
    let timestamp = notification
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    let branch = notification.branch.as_deref().unwrap_or("N/A");

    match platform {
        Platform::Slack => {
            let mut blocks = vec![
                json!({
                    "type": "header",
                    "text": { "type": "plain_text", "text": notification.title }
                }),
                json!({
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": notification.message },
                    "fields": [
                        { "type": "mrkdwn", "text": format!("*Status:*\n{}", notification.status.label()) },
                        { "type": "mrkdwn", "text": format!("*Branch:*\n{branch}") },
                        { "type": "mrkdwn", "text": format!("*Time:*\n{timestamp}") }
                    ]
                }),
            ];
            if let Some(details) = &notification.details {
                blocks.push(json!({
                    "type": "section",
                    "text": {
                        "type": "mrkdwn",
                        "text": format!("*Details:*\n{}", details.join("\n"))
                    }
                }));
            }
            json!({ "blocks": blocks })
        }
        Platform::Teams => {
            let mut body = vec![
                json!({
                    "type": "TextBlock",
                    "size": "Medium",
                    "weight": "Bolder",
                    "text": notification.title
                }),
                json!({ "type": "TextBlock", "text": notification.message, "wrap": true }),
                json!({
                    "type": "FactSet",
                    "facts": [
                        { "title": "Status", "value": notification.status.label() },
                        { "title": "Branch", "value": branch },
                        { "title": "Time", "value": timestamp }
                    ]
                }),
            ];
            if let Some(details) = &notification.details {
                body.push(json!({ "type": "TextBlock", "text": "Details:", "weight": "Bolder" }));
                body.push(json!({
                    "type": "TextBlock",
                    "text": details.join("\n"),
                    "wrap": true
                }));
            }
            json!({
                "type": "message",
                "attachments": [{
                    "contentType": "application/vnd.microsoft.card.adaptive",
                    "content": {
                        "type": "AdaptiveCard",
                        "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                        "version": "1.2",
                        "body": body
                    }
                }]
            })
        }
    }
}
