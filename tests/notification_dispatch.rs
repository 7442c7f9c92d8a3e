use serde_json::Value;

use site_sync::notify::{
    format_notification, BuildNotification, MockNotificationSender, NotificationConfig,
    NotificationDispatcher, NotificationStatus, Platform,
};

fn sample_notification() -> BuildNotification {
    BuildNotification {
        status: NotificationStatus::Success,
        title: "Build Completed Successfully".to_string(),
        message: "Branch: static\nBuild and validation completed successfully".to_string(),
        branch: Some("static".to_string()),
        details: Some(vec!["2 pages rebuilt".to_string()]),
        timestamp: Some("2026-01-01T00:00:00Z".to_string()),
    }
}

/// One channel's delivery failure never blocks the other channels and never
/// reaches the caller.
#[tokio::test]
async fn test_channel_failure_is_isolated() {
    let mut sender = MockNotificationSender::new();
    sender
        .expect_deliver()
        .withf(|url, _| url.contains("slack"))
        .times(1)
        .returning(|_, _| Err("410 Gone".to_string().into()));
    sender
        .expect_deliver()
        .withf(|url, _| url.contains("teams"))
        .times(1)
        .returning(|_, _| Ok(()));

    let dispatcher = NotificationDispatcher::new(
        vec![
            NotificationConfig {
                webhook_url: "https://hooks.slack.example/T000/B000".to_string(),
                platform: Platform::Slack,
            },
            NotificationConfig {
                webhook_url: "https://teams.example/webhook/abc".to_string(),
                platform: Platform::Teams,
            },
        ],
        Box::new(sender),
    );

    // Must complete without panicking or surfacing the Slack failure
    dispatcher.send_build_notification(&sample_notification()).await;
}

/// A dispatcher with no configured channels delivers nothing.
#[tokio::test]
async fn test_no_channels_means_no_deliveries() {
    let mut sender = MockNotificationSender::new();
    sender.expect_deliver().times(0);

    let dispatcher = NotificationDispatcher::new(vec![], Box::new(sender));
    assert_eq!(dispatcher.channel_count(), 0);
    dispatcher.send_build_notification(&sample_notification()).await;
}

/// Test notifications emit one delivery per status per channel.
#[tokio::test]
async fn test_test_notifications_cover_every_status() {
    let mut sender = MockNotificationSender::new();
    sender.expect_deliver().times(3).returning(|_, _| Ok(()));

    let dispatcher = NotificationDispatcher::new(
        vec![NotificationConfig {
            webhook_url: "https://hooks.slack.example/T000/B000".to_string(),
            platform: Platform::Slack,
        }],
        Box::new(sender),
    );
    dispatcher.send_test_notifications().await;
}

/// Slack payloads use block kit with header, status fields and details.
#[test]
fn test_slack_payload_shape() {
    let payload = format_notification(&sample_notification(), Platform::Slack);

    let blocks = payload["blocks"].as_array().expect("blocks array");
    assert_eq!(blocks.len(), 3, "header, section and details blocks");
    assert_eq!(blocks[0]["type"], "header");
    assert_eq!(
        blocks[0]["text"]["text"],
        "Build Completed Successfully"
    );

    let fields = blocks[1]["fields"].as_array().expect("fields array");
    let field_text: Vec<&str> = fields
        .iter()
        .filter_map(|f| f["text"].as_str())
        .collect();
    assert!(field_text.iter().any(|t| t.contains("SUCCESS")));
    assert!(field_text.iter().any(|t| t.contains("static")));

    assert!(blocks[2]["text"]["text"]
        .as_str()
        .unwrap()
        .contains("2 pages rebuilt"));
}

/// Teams payloads wrap an adaptive card with a fact set.
#[test]
fn test_teams_payload_shape() {
    let payload = format_notification(&sample_notification(), Platform::Teams);

    assert_eq!(payload["type"], "message");
    let content = &payload["attachments"][0]["content"];
    assert_eq!(content["type"], "AdaptiveCard");

    let body = content["body"].as_array().expect("card body");
    assert_eq!(body[0]["text"], "Build Completed Successfully");

    let facts = body[2]["facts"].as_array().expect("facts array");
    let fact_values: Vec<(&str, &str)> = facts
        .iter()
        .filter_map(|f| Some((f["title"].as_str()?, f["value"].as_str()?)))
        .collect();
    assert!(fact_values.contains(&("Status", "SUCCESS")));
    assert!(fact_values.contains(&("Branch", "static")));
}

/// Absent branch and timestamp fall back to placeholders instead of
/// breaking the payload.
#[test]
fn test_payload_tolerates_missing_optional_fields() {
    let notification = BuildNotification {
        status: NotificationStatus::Warning,
        title: "Cleanup Warning".to_string(),
        message: "Optional task skipped".to_string(),
        branch: None,
        details: None,
        timestamp: None,
    };
    let payload = format_notification(&notification, Platform::Slack);

    let blocks = payload["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 2, "no details block without details");
    let fields_json = serde_json::to_string(&blocks[1]["fields"]).unwrap();
    assert!(fields_json.contains("N/A"), "missing branch renders as N/A");
    assert!(matches!(payload["blocks"], Value::Array(_)));
}
