//! CLI subcommands and the wiring they share

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use odbackup_core::config::{BackupJobConfig, Config};
use odbackup_graph::auth::GraphAuth;
use odbackup_graph::provider::GraphDrive;
use odbackup_sync::BackupJobRunner;

pub mod config;
pub mod daemon;
pub mod status;
pub mod sync;

/// `--config` if given, else the platform default
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path)
}

/// Loads and validates the configuration
///
/// # Errors
/// Fails when the file cannot be read or parsed, or when validation finds
/// any problem (including an empty job list).
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok(config)
}

/// Jobs to run: all of them, or the one named by `--account`
pub fn select_jobs(config: &Config, account: Option<&str>) -> Result<Vec<BackupJobConfig>> {
    match account {
        None => Ok(config.jobs.clone()),
        Some(name) => match config.job(name) {
            Some(job) => Ok(vec![job.clone()]),
            None => bail!("No job configured for account '{}'", name),
        },
    }
}

/// Builds the runner with the Graph adapters
///
/// The token endpoint client does not follow redirects; the Graph client
/// must, because content downloads answer with a redirect to the file host.
pub fn build_runner(config: &Config) -> Result<BackupJobRunner> {
    let auth_http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Failed to build HTTP client for the token endpoint")?;
    let graph_http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client for Microsoft Graph")?;

    let auth = GraphAuth::with_endpoints(
        auth_http,
        config.graph.token_url.clone(),
        config.graph.redirect_uri.clone(),
    );
    let drive = GraphDrive::from_config(graph_http, &config.graph);
    Ok(BackupJobRunner::new(Arc::new(auth), Arc::new(drive)))
}
