use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::build::BuildOrchestrator;
use crate::cleanup::CleanupCoordinator;
use crate::config::AppConfig;
use crate::gateway::{GitCommandGateway, VersionControlGateway};
use crate::load_config::load_config;
use crate::notify::{HttpNotificationSender, NotificationDispatcher};
use crate::server::{AppState, SyncServer};
use crate::synchronise::{CommitSynchroniser, HttpCommitEndpoint};

/// CLI for site-sync: auto-commit synchronisation and static build pipeline.
#[derive(Parser)]
#[clap(
    name = "site-sync",
    version,
    about = "Auto-commit content changes and build/export static output for a CMS-backed site"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP boundary: health, commit and webhook endpoints
    Serve {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Run one build for a configured branch
    Build {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Branch identifier to build
        #[clap(long)]
        branch: String,
    },
    /// Pull latest content, build the static branch and push the output
    Export {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Run the client-side commit synchroniser loop against a state file
    Watch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// JSON state file polled for changes; defaults to
        /// .site-sync/state.json under the workdir
        #[clap(long)]
        state_file: Option<PathBuf>,
    },
    /// Send one test notification per status to all configured channels
    NotifyTest {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { config } => {
            let config = load_config(config)?;
            if config.webhook_secret.is_none() {
                anyhow::bail!("WEBHOOK_SECRET must be set to serve the webhook endpoint");
            }
            let bind_addr = config.bind_addr.clone();
            let state = build_app_state(config);
            let mut server = SyncServer::new(state);
            let addr = server.start(&bind_addr).await?;
            println!("Sync server listening on {addr}");
            tokio::signal::ctrl_c().await?;
            server.stop();
            Ok(())
        }
        Commands::Build { config, branch } => {
            let config = load_config(config)?;
            let orchestrator = build_orchestrator(&config);
            let validation = orchestrator.validate_branch(&branch).await;
            if !validation.is_valid {
                eprintln!("[ERROR] {}", validation.message);
                anyhow::bail!(validation.details.join("; "));
            }
            let result = orchestrator.build(&branch).await?;
            println!("Build result:\n{:#?}", result);
            if result.success {
                Ok(())
            } else {
                Err(anyhow::Error::msg(result.details.unwrap_or(result.message)))
            }
        }
        Commands::Export { config } => {
            let config = load_config(config)?;
            let orchestrator = build_orchestrator(&config);
            let result = orchestrator.export().await?;
            println!("Export result:\n{:#?}", result);
            if result.success {
                Ok(())
            } else {
                Err(anyhow::Error::msg(result.details.unwrap_or(result.message)))
            }
        }
        Commands::Watch { config, state_file } => {
            let config = load_config(config)?;
            let state_path =
                state_file.unwrap_or_else(|| config.workdir.join(".site-sync/state.json"));
            let endpoint = Arc::new(HttpCommitEndpoint::new(
                config.sync.endpoint_url.clone(),
                config.git_token.clone(),
            ));
            let synchroniser = Arc::new(CommitSynchroniser::new(config.sync.clone(), endpoint));
            synchroniser.start(move || match std::fs::read_to_string(&state_path) {
                Ok(contents) => serde_json::from_str(&contents)
                    .unwrap_or(serde_json::Value::String(contents)),
                Err(_) => serde_json::Value::Null,
            });
            println!("Watching for changes, Ctrl-C to stop...");
            tokio::signal::ctrl_c().await?;
            synchroniser.stop();
            Ok(())
        }
        Commands::NotifyTest { config } => {
            let _config = load_config(config)?;
            let dispatcher =
                NotificationDispatcher::from_env(Box::new(HttpNotificationSender::new()));
            if dispatcher.channel_count() == 0 {
                println!("No notification channels configured");
                return Ok(());
            }
            dispatcher.send_test_notifications().await;
            println!("Test notifications sent");
            Ok(())
        }
    }
}

fn build_orchestrator(config: &AppConfig) -> Arc<BuildOrchestrator> {
    let gateway = Arc::new(GitCommandGateway::new(
        config.workdir.clone(),
        config.identity.clone(),
    ));
    let notifier = Arc::new(NotificationDispatcher::from_env(Box::new(
        HttpNotificationSender::new(),
    )));
    let cleanup = CleanupCoordinator::for_workdir(&config.workdir);
    Arc::new(BuildOrchestrator::new(
        config.workdir.clone(),
        config.branches.clone(),
        gateway,
        notifier,
        cleanup,
    ))
}

fn build_app_state(config: AppConfig) -> Arc<AppState> {
    let gateway: Arc<dyn VersionControlGateway> = Arc::new(GitCommandGateway::new(
        config.workdir.clone(),
        config.identity.clone(),
    ));
    let orchestrator = build_orchestrator(&config);
    Arc::new(AppState {
        gateway,
        orchestrator,
        webhook_secret: config.webhook_secret,
        git_token: config.git_token,
    })
}
