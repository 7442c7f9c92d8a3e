use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::tempdir;

use site_sync::build::BuildOrchestrator;
use site_sync::cleanup::CleanupCoordinator;
use site_sync::config::BranchConfig;
use site_sync::error::SyncError;
use site_sync::fakes::InMemoryGateway;
use site_sync::notify::{HttpNotificationSender, NotificationDispatcher};

/// Dispatcher with zero channels: notifications become silent no-ops.
fn silent_notifier() -> Arc<NotificationDispatcher> {
    Arc::new(NotificationDispatcher::new(
        vec![],
        Box::new(HttpNotificationSender::new()),
    ))
}

fn branch_config(command: &str, output_dir: &str, required: &[&str]) -> BranchConfig {
    BranchConfig {
        build_command: command.to_string(),
        output_dir: PathBuf::from(output_dir),
        required_paths: required.iter().map(PathBuf::from).collect(),
        preserved_paths: vec![],
    }
}

fn orchestrator_with(
    workdir: PathBuf,
    branches: HashMap<String, BranchConfig>,
    gateway: Arc<InMemoryGateway>,
) -> BuildOrchestrator {
    let cleanup = CleanupCoordinator::for_workdir(&workdir);
    BuildOrchestrator::new(workdir, branches, gateway, silent_notifier(), cleanup)
}

/// A build whose command produces all required artifacts succeeds; a
/// non-static branch never pushes output.
#[tokio::test]
async fn test_successful_build_for_regular_branch_does_not_push() {
    let work = tempdir().unwrap();
    let mut branches = HashMap::new();
    branches.insert(
        "main".to_string(),
        branch_config(
            "mkdir -p dist/assets && touch dist/index.html",
            "dist",
            &["index.html", "assets"],
        ),
    );
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = orchestrator_with(
        work.path().to_path_buf(),
        branches,
        Arc::clone(&gateway),
    );

    let result = orchestrator.build("main").await.expect("build should run");
    assert!(result.success, "details: {:?}", result.details);
    assert_eq!(result.branch, "main");
    assert!(
        gateway.push_attempts().is_empty(),
        "only the static branch pushes build output"
    );
}

/// Building the static branch pushes the output to its remote branch.
#[tokio::test]
async fn test_static_branch_build_pushes_output() {
    let work = tempdir().unwrap();
    let mut branches = HashMap::new();
    branches.insert(
        "static".to_string(),
        branch_config(
            "mkdir -p out/_next/static && touch out/index.html",
            "out",
            &["index.html", "_next/static"],
        ),
    );
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = orchestrator_with(
        work.path().to_path_buf(),
        branches,
        Arc::clone(&gateway),
    );

    let result = orchestrator.build("static").await.expect("build should run");
    assert!(result.success, "details: {:?}", result.details);
    assert_eq!(gateway.push_attempts(), vec!["static".to_string()]);
}

/// Exit code zero is not enough: missing required artifacts fail the build.
#[tokio::test]
async fn test_missing_required_artifact_fails_validation() {
    let work = tempdir().unwrap();
    let mut branches = HashMap::new();
    branches.insert(
        "main".to_string(),
        branch_config("mkdir -p dist && touch dist/other.txt", "dist", &["index.html"]),
    );
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = orchestrator_with(work.path().to_path_buf(), branches, gateway);

    let result = orchestrator.build("main").await.expect("build should run");
    assert!(!result.success);
    assert_eq!(result.message, "Build Validation Failed");
    assert!(
        result.details.unwrap().contains("index.html"),
        "failure detail must name the missing artifact"
    );
}

/// A failing build command is reported without touching the gateway.
#[tokio::test]
async fn test_failing_build_command_is_reported() {
    let work = tempdir().unwrap();
    let mut branches = HashMap::new();
    branches.insert(
        "static".to_string(),
        branch_config("exit 3", "out", &["index.html"]),
    );
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = orchestrator_with(
        work.path().to_path_buf(),
        branches,
        Arc::clone(&gateway),
    );

    let result = orchestrator.build("static").await.expect("build should run");
    assert!(!result.success);
    assert_eq!(result.message, "Build Process Failed");
    assert!(gateway.push_attempts().is_empty());
}

/// An unconfigured branch is a hard error, not a failed result.
#[tokio::test]
async fn test_unknown_branch_is_a_hard_error() {
    let work = tempdir().unwrap();
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = orchestrator_with(work.path().to_path_buf(), HashMap::new(), gateway);

    let err = orchestrator
        .build("feature/unknown")
        .await
        .expect_err("unknown branch should error");
    assert!(matches!(err, SyncError::UnknownBranch(b) if b == "feature/unknown"));
}

/// Preserved paths survive a build command that deletes them.
#[tokio::test]
async fn test_preserved_paths_survive_the_build() {
    let work = tempdir().unwrap();
    fs::write(work.path().join("keep.json"), "{\"keep\":true}").unwrap();

    let mut branches = HashMap::new();
    branches.insert(
        "main".to_string(),
        BranchConfig {
            build_command: "rm keep.json && mkdir -p dist && touch dist/index.html".to_string(),
            output_dir: PathBuf::from("dist"),
            required_paths: vec![PathBuf::from("index.html")],
            preserved_paths: vec![PathBuf::from("keep.json")],
        },
    );
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = orchestrator_with(work.path().to_path_buf(), branches, gateway);

    let result = orchestrator.build("main").await.expect("build should run");
    assert!(result.success, "details: {:?}", result.details);
    assert_eq!(
        fs::read_to_string(work.path().join("keep.json")).unwrap(),
        "{\"keep\":true}",
        "preserved file must be restored after the build"
    );
}

/// The export flow pulls content, builds the static branch, pushes the
/// output and records the export timestamp.
#[tokio::test]
async fn test_export_pulls_builds_pushes_and_records_timestamp() {
    let work = tempdir().unwrap();
    let mut branches = HashMap::new();
    branches.insert(
        "static".to_string(),
        branch_config(
            "mkdir -p out/_next/static && touch out/index.html",
            "out",
            &["index.html", "_next/static"],
        ),
    );
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = orchestrator_with(
        work.path().to_path_buf(),
        branches,
        Arc::clone(&gateway),
    );

    assert!(orchestrator.last_export_at().is_none());

    let result = orchestrator.export().await.expect("export should run");
    assert!(result.success, "details: {:?}", result.details);
    assert_eq!(gateway.content_pulls(), 1);
    assert_eq!(gateway.push_attempts(), vec!["static".to_string()]);
    assert!(orchestrator.last_export_at().is_some());

    // Post-export cleanup removed the output directory
    assert!(!work.path().join("out").exists());
}

/// Cleanup is idempotent: a second pass over an already-clean workspace
/// still succeeds.
#[test]
fn test_cleanup_is_idempotent() {
    let work = tempdir().unwrap();
    fs::create_dir_all(work.path().join("out")).unwrap();
    fs::create_dir_all(work.path().join(".next/cache")).unwrap();
    fs::write(work.path().join(".temp-build"), "x").unwrap();

    let coordinator = CleanupCoordinator::for_workdir(work.path());

    let first = coordinator.cleanup("static");
    assert!(first.success, "details: {:?}", first.details);
    assert!(!work.path().join("out").exists());
    assert!(!work.path().join(".next").exists());
    assert!(!work.path().join(".temp-build").exists());

    let second = coordinator.cleanup("static");
    assert!(second.success, "cleaning a clean workspace must succeed");
}
