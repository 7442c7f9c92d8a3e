use site_sync::error::GatewayError;
use site_sync::fakes::InMemoryGateway;
use site_sync::gateway::{CommitStatus, VersionControlGateway};

/// A clean working tree commits nothing and reports no changes.
#[tokio::test]
async fn test_clean_tree_reports_no_changes() {
    let gateway = InMemoryGateway::new();

    let result = gateway
        .commit_and_push("Auto-commit changes", None)
        .await
        .expect("clean tree should not error");

    assert_eq!(result.status, CommitStatus::NoChanges);
    assert!(result.changed_paths.is_empty());
    assert!(gateway.commits().is_empty());
    assert!(gateway.push_attempts().is_empty());
}

/// A dirty tree is committed with the given message and pushed to the sync
/// branch, which is created on the remote when absent.
#[tokio::test]
async fn test_dirty_tree_commits_and_pushes_to_sync_branch() {
    let gateway = InMemoryGateway::new();
    gateway.touch("content/page.md");
    gateway.touch("content/about.md");

    let result = gateway
        .commit_and_push("Auto-commit: Periodic save of changes at now", None)
        .await
        .expect("commit should succeed");

    assert_eq!(result.status, CommitStatus::Success);
    assert_eq!(result.changed_paths.len(), 2);

    let commits = gateway.commits();
    assert_eq!(commits.len(), 1);
    assert!(commits[0].message.starts_with("Auto-commit"));
    assert_eq!(commits[0].paths.len(), 2);

    assert_eq!(gateway.push_attempts(), vec!["staging".to_string()]);
    assert!(
        gateway.remote_branches().contains("staging"),
        "push must create the missing remote branch instead of failing"
    );
}

/// A credentialed remote rejects tokenless commits with an authentication
/// error; supplying the token succeeds.
#[tokio::test]
async fn test_credentialed_remote_requires_token() {
    let gateway = InMemoryGateway::new();
    gateway.require_token();
    gateway.touch("content/page.md");

    let err = gateway
        .commit_and_push("Auto-commit changes", None)
        .await
        .expect_err("tokenless commit should be rejected");
    assert!(matches!(err, GatewayError::Authentication(_)));
    assert!(!err.is_retryable());

    let result = gateway
        .commit_and_push("Auto-commit changes", Some("test-token"))
        .await
        .expect("token-bearing commit should succeed");
    assert_eq!(result.status, CommitStatus::Success);
}

/// Scripted push failures surface as retryable network errors.
#[tokio::test]
async fn test_scripted_push_failure_is_retryable_network_error() {
    let gateway = InMemoryGateway::new();
    gateway.fail_next_pushes(1);

    let err = gateway
        .push_static_output("static")
        .await
        .expect_err("scripted failure should surface");
    assert!(matches!(err, GatewayError::Network(_)));
    assert!(err.is_retryable());

    // The scripted failure is consumed; the next push lands
    let result = gateway
        .push_static_output("static")
        .await
        .expect("push should succeed once the failure is consumed");
    assert!(result.success);
    assert!(result.commit_sha.is_some());
    assert!(gateway.remote_branches().contains("static"));
}

/// branch_exists reflects only branches the fake remote knows about.
#[tokio::test]
async fn test_branch_exists_tracks_remote_state() {
    let gateway = InMemoryGateway::new();
    assert!(!gateway.branch_exists("static").await.unwrap());

    gateway.add_remote_branch("static");
    assert!(gateway.branch_exists("static").await.unwrap());
    assert!(!gateway.branch_exists("unrelated").await.unwrap());
}

/// Content pulls are counted, one per export.
#[tokio::test]
async fn test_content_pulls_are_counted() {
    let gateway = InMemoryGateway::new();
    assert_eq!(gateway.content_pulls(), 0);
    gateway.pull_latest_content().await.unwrap();
    gateway.pull_latest_content().await.unwrap();
    assert_eq!(gateway.content_pulls(), 2);
}
