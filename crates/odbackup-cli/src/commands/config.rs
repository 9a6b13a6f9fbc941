//! Config command - Inspect the configuration file
//!
//! - `odbackup config path` prints where the configuration is read from
//! - `odbackup config validate` loads the file and reports every problem

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use odbackup_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file path
    Path,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Path => execute_path(config_path, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
        }
    }
}

fn execute_path(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    if format == OutputFormat::Json {
        formatter.print_json(&serde_json::json!({
            "config_path": config_path.display().to_string(),
            "exists": config_path.exists(),
        }));
    } else {
        println!("{}", config_path.display());
    }
    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    info!(config_path = %config_path.display(), "Validating configuration");

    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let errors = config.validate();

    if format == OutputFormat::Json {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "jobs": config.jobs.len(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success(&format!(
            "Configuration is valid ({} job{})",
            config.jobs.len(),
            if config.jobs.len() == 1 { "" } else { "s" }
        ));
    } else {
        for error in &errors {
            formatter.error(&error.to_string());
        }
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }
    Ok(())
}
