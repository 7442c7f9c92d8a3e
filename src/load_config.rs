use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::{
    default_branch_configs, AppConfig, BranchConfig, GitIdentity, SyncSettings,
};

#[derive(Deserialize, Default)]
struct StaticConfig {
    #[serde(default)]
    workdir: Option<PathBuf>,
    #[serde(default)]
    bind_addr: Option<String>,
    #[serde(default)]
    sync: Option<SyncSection>,
    #[serde(default)]
    identity: Option<IdentitySection>,
    #[serde(default)]
    branches: Option<HashMap<String, BranchConfig>>,
}

#[derive(Deserialize)]
struct SyncSection {
    #[serde(default)]
    interval_ms: Option<u64>,
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    snapshot_path: Option<PathBuf>,
    #[serde(default)]
    endpoint_url: Option<String>,
}

#[derive(Deserialize)]
struct IdentitySection {
    name: String,
    email: String,
}

/// Loads a static YAML config file (no secrets) and merges required env vars
/// for secrets. Returns a fully merged AppConfig or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let static_conf: StaticConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let defaults = SyncSettings::default();
    let sync = match static_conf.sync {
        Some(section) => SyncSettings {
            interval_ms: section.interval_ms.unwrap_or(defaults.interval_ms),
            max_retries: section.max_retries.unwrap_or(defaults.max_retries),
            snapshot_path: section.snapshot_path.unwrap_or(defaults.snapshot_path),
            endpoint_url: section.endpoint_url.unwrap_or(defaults.endpoint_url),
        },
        None => defaults,
    };

    // Committer identity: YAML first, env overrides, built-in default last.
    let mut identity = match static_conf.identity {
        Some(section) => GitIdentity {
            name: section.name,
            email: section.email,
        },
        None => GitIdentity::default(),
    };
    if let Ok(name) = std::env::var("GIT_COMMITTER_NAME") {
        identity.name = name;
    }
    if let Ok(email) = std::env::var("GIT_COMMITTER_EMAIL") {
        identity.email = email;
    }

    // Secrets come only from the environment, never from the YAML file.
    let git_token = std::env::var("GIT_TOKEN").ok();
    let webhook_secret = std::env::var("WEBHOOK_SECRET").ok();
    if git_token.is_some() {
        info!("GIT_TOKEN found in env");
    }

    let branches = static_conf
        .branches
        .filter(|b| !b.is_empty())
        .unwrap_or_else(default_branch_configs);

    let config = AppConfig {
        workdir: static_conf.workdir.unwrap_or_else(|| PathBuf::from(".")),
        bind_addr: static_conf
            .bind_addr
            .unwrap_or_else(|| "127.0.0.1:3999".to_string()),
        sync,
        identity,
        branches,
        git_token,
        webhook_secret,
    };

    config.trace_loaded();
    Ok(config)
}
