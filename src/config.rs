//! Application configuration module
//!
//! Handles loading and validating configuration from a TOML file layered
//! with environment variable overrides.

use crate::enrich::JoinSpec;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;
use validator::Validate;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Status server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(127, 0, 0, 1),
            port: 3900,
        }
    }
}

/// Configuration of one monitored table
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct MonitorConfig {
    /// Monitor name, used in logs and the status surface.
    #[validate(length(min = 1))]
    pub name: String,

    /// Directory holding the legacy store's table files.
    pub data_dir: PathBuf,

    /// Primary table to watch.
    #[validate(length(min = 1))]
    pub table: String,

    /// Field whose textual value is the primary key.
    #[validate(length(min = 1))]
    pub key_field: String,

    /// Polling interval in seconds. Must be positive.
    #[validate(range(min = 1))]
    pub poll_interval_secs: u64,

    /// Webhook destination for change notifications.
    #[validate(url)]
    pub webhook_url: String,

    /// Bound on each outbound notification request.
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Bound on reading the primary table; a read that exceeds it fails the
    /// cycle instead of stalling the scheduler.
    #[serde(default = "default_source_timeout_secs")]
    #[validate(range(min = 1))]
    pub source_timeout_secs: u64,

    /// Whether the very first cycle (no prior snapshot) notifies its
    /// all-records-new delta.
    #[serde(default = "default_true")]
    pub notify_on_first_cycle: bool,

    /// When true, a cycle is skipped cheaply if the source's reported
    /// modification time has not advanced. Disable for sources without
    /// reliable modification times; every cycle then does a full diff.
    #[serde(default = "default_true")]
    pub trust_modification_time: bool,

    /// Optional `field=value` row filter applied when reading the table.
    #[serde(default)]
    pub filter: Option<String>,

    /// Joins used to enrich each changed row.
    #[serde(default)]
    #[validate(nested)]
    pub joins: Vec<JoinSpec>,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_source_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Complete application settings
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub monitors: Vec<MonitorConfig>,
}

impl Settings {
    /// Load settings from `TABLEWATCH_CONFIG` (default `tablewatch.toml`),
    /// with `TW__`-prefixed environment variables taking precedence.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let path = std::env::var("TABLEWATCH_CONFIG")
            .unwrap_or_else(|_| "tablewatch.toml".to_string());

        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(&path))
            .add_source(config::Environment::with_prefix("TW").separator("__"))
            .build()?
            .try_deserialize()?;

        settings
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(settings)
    }
}
