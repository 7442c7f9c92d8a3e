use serde_json::{json, Value};

use site_sync::webhook::{WebhookError, WebhookValidator};

const SECRET: &str = "shared-test-secret";

/// Matching signature plus an accepted event passes validation.
#[test]
fn test_valid_headers_pass() {
    for event in ["push", "repository"] {
        assert_eq!(
            WebhookValidator::validate_headers(Some(SECRET), Some(event), SECRET),
            Ok(())
        );
    }
}

/// Signature problems map to 401, everything else to 400.
#[test]
fn test_header_failures_map_to_http_statuses() {
    let missing_sig =
        WebhookValidator::validate_headers(None, Some("push"), SECRET).unwrap_err();
    assert_eq!(missing_sig, WebhookError::MissingSignature);
    assert_eq!(missing_sig.status(), 401);

    let bad_sig =
        WebhookValidator::validate_headers(Some("wrong"), Some("push"), SECRET).unwrap_err();
    assert_eq!(bad_sig, WebhookError::InvalidSignature);
    assert_eq!(bad_sig.status(), 401);

    let missing_event = WebhookValidator::validate_headers(Some(SECRET), None, SECRET).unwrap_err();
    assert_eq!(missing_event, WebhookError::MissingEvent);
    assert_eq!(missing_event.status(), 400);

    let bad_event =
        WebhookValidator::validate_headers(Some(SECRET), Some("deployment"), SECRET).unwrap_err();
    assert_eq!(bad_event, WebhookError::InvalidEvent("deployment".to_string()));
    assert_eq!(bad_event.status(), 400);
}

/// A manual trigger names its branch and always counts as a schema change.
#[test]
fn test_manual_payload_requires_branch() {
    let valid = WebhookValidator::validate_payload(&json!({
        "manual": true,
        "branch": "static"
    }))
    .expect("manual payload with branch should validate");
    assert_eq!(valid.manual_branch.as_deref(), Some("static"));
    assert!(valid.is_schema_change);

    let err = WebhookValidator::validate_payload(&json!({"manual": true})).unwrap_err();
    assert!(matches!(err, WebhookError::InvalidPayload(_)));
    assert_eq!(err.status(), 400);
}

/// Provider payloads need at least a ref or a repository field.
#[test]
fn test_provider_payload_needs_ref_or_repository() {
    assert!(WebhookValidator::validate_payload(&json!({
        "ref": "refs/heads/staging"
    }))
    .is_ok());
    assert!(WebhookValidator::validate_payload(&json!({
        "repository": {"full_name": "org/site"}
    }))
    .is_ok());

    let err = WebhookValidator::validate_payload(&json!({"zen": "keep it simple"})).unwrap_err();
    assert!(matches!(err, WebhookError::InvalidPayload(_)));
}

/// An absent payload is rejected outright.
#[test]
fn test_null_payload_is_rejected() {
    let err = WebhookValidator::validate_payload(&Value::Null).unwrap_err();
    assert_eq!(err, WebhookError::MissingPayload);
}

/// Commits touching CMS schema or configuration files are classified as
/// schema changes; ordinary content edits are not.
#[test]
fn test_schema_change_classification() {
    let schema_payload = json!({
        "ref": "refs/heads/cms",
        "commits": [
            { "added": [], "modified": ["content/posts/hello.md"], "removed": [] },
            { "added": ["tina/collections/page.ts"], "modified": [], "removed": [] }
        ]
    });
    let validation = WebhookValidator::validate_payload(&schema_payload).unwrap();
    assert!(validation.is_schema_change);
    assert!(validation.manual_branch.is_none());

    let content_payload = json!({
        "ref": "refs/heads/cms",
        "commits": [
            { "added": [], "modified": ["content/posts/hello.md"], "removed": [] }
        ]
    });
    assert!(!WebhookValidator::validate_payload(&content_payload)
        .unwrap()
        .is_schema_change);

    // Removed files count too
    let removal_payload = json!({
        "ref": "refs/heads/cms",
        "commits": [
            { "added": [], "modified": [], "removed": ["pages/site.schema.json"] }
        ]
    });
    assert!(WebhookValidator::validate_payload(&removal_payload)
        .unwrap()
        .is_schema_change);
}
