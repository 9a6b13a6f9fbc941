//! Configuration module for odbackup.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation and defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::exclusion::ExclusionFilter;
use crate::domain::remote_item::normalize_root;
use crate::ports::auth_provider::ClientCredentials;

/// Microsoft Graph v1.0 endpoint
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Microsoft account token endpoint for personal OneDrive
pub const DEFAULT_TOKEN_URL: &str = "https://login.live.com/oauth20_token.srf";

/// Redirect URI registered for native clients
pub const DEFAULT_REDIRECT_URI: &str =
    "https://login.microsoftonline.com/common/oauth2/nativeclient";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for odbackup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub graph: GraphConfig,
    pub jobs: Vec<BackupJobConfig>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

/// Remote endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub base_url: String,
    pub token_url: String,
    pub redirect_uri: String,
}

/// How a job observes the remote tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Enumerate the whole tree every run
    #[default]
    FullListing,
    /// Follow the incremental change feed from the stored cursor
    Delta,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::FullListing => write!(f, "full_listing"),
            SyncMode::Delta => write!(f, "delta"),
        }
    }
}

/// One account mirrored into one local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupJobConfig {
    /// Display name, also part of the job identity.
    pub account_name: String,
    pub client_id: String,
    /// Empty for public clients.
    pub client_secret: String,
    pub refresh_token: String,
    /// Remote folder to mirror; empty or `/` means the whole drive.
    pub remote_root: String,
    /// Local directory that receives the mirror and the checkpoint file.
    pub local_target_directory: PathBuf,
    /// Minutes between scheduled runs.
    pub interval_minutes: u64,
    /// Case-insensitive substrings; matching paths are not mirrored.
    pub excluded: Vec<String>,
    /// Maximum simultaneous downloads.
    pub max_concurrency: usize,
    pub sync_mode: SyncMode,
}

impl BackupJobConfig {
    /// Credentials for the auth provider
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    /// Exclusion filter built from `excluded`
    pub fn exclusion_filter(&self) -> ExclusionFilter {
        ExclusionFilter::new(&self.excluded)
    }

    /// Remote root as `""` or `/a/b`
    pub fn normalized_root(&self) -> String {
        normalize_root(&self.remote_root)
    }

    /// Scheduling interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// Key used to keep two runs of the same job from overlapping
    pub fn identity(&self) -> String {
        format!(
            "{}|{}|{}",
            self.account_name,
            self.normalized_root(),
            self.local_target_directory.display()
        )
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    ///
    /// # Errors
    /// Fails when the file cannot be read or is not valid YAML for
    /// [`Config`]; the error names the file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/odbackup/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("odbackup")
            .join("config.yaml")
    }

    /// Looks up a job by account name
    pub fn job(&self, account_name: &str) -> Option<&BackupJobConfig> {
        self.jobs.iter().find(|j| j.account_name == account_name)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl Default for BackupJobConfig {
    fn default() -> Self {
        Self {
            account_name: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            remote_root: String::new(),
            local_target_directory: PathBuf::new(),
            interval_minutes: 60,
            excluded: Vec::new(),
            max_concurrency: 4,
            sync_mode: SyncMode::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"jobs[0].interval_minutes"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}', expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- graph ---
        for (field, value) in [
            ("graph.base_url", &self.graph.base_url),
            ("graph.token_url", &self.graph.token_url),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            }
        }

        // --- jobs ---
        if self.jobs.is_empty() {
            errors.push(ValidationError {
                field: "jobs".into(),
                message: "at least one backup job must be configured".into(),
            });
        }

        let mut seen = HashSet::new();
        for (i, job) in self.jobs.iter().enumerate() {
            let prefix = format!("jobs[{i}]");

            if job.account_name.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("{prefix}.account_name"),
                    message: "must not be empty".into(),
                });
            } else if !seen.insert(job.account_name.as_str()) {
                errors.push(ValidationError {
                    field: format!("{prefix}.account_name"),
                    message: format!("duplicate account name '{}'", job.account_name),
                });
            }
            if job.client_id.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("{prefix}.client_id"),
                    message: "must not be empty".into(),
                });
            }
            if job.refresh_token.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("{prefix}.refresh_token"),
                    message: "must not be empty".into(),
                });
            }
            if job.local_target_directory.as_os_str().is_empty() {
                errors.push(ValidationError {
                    field: format!("{prefix}.local_target_directory"),
                    message: "must not be empty".into(),
                });
            }
            if job.interval_minutes == 0 {
                errors.push(ValidationError {
                    field: format!("{prefix}.interval_minutes"),
                    message: "must be greater than 0".into(),
                });
            }
            if job.max_concurrency == 0 {
                errors.push(ValidationError {
                    field: format!("{prefix}.max_concurrency"),
                    message: "must be greater than 0".into(),
                });
            }
            // An empty substring matches every path.
            if let Some(pos) = job.excluded.iter().position(|p| p.is_empty()) {
                errors.push(ValidationError {
                    field: format!("{prefix}.excluded[{pos}]"),
                    message: "empty pattern would exclude everything".into(),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
