//! Configuration management for cinesync
//!
//! Handles loading and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL source configuration
    #[serde(default)]
    pub postgres: PostgresConfig,

    /// Elasticsearch target configuration
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,

    /// Sync loop configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Connection retry backoff configuration
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// PostgreSQL source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Connection URL (DATABASE_URL overrides the built-in default)
    #[serde(default = "default_postgres_url")]
    pub url: String,

    /// Schema holding film_work and its satellite tables
    #[serde(default = "default_postgres_schema")]
    pub schema: String,

    /// Maximum pool connections
    #[serde(default = "default_postgres_max_connections")]
    pub max_connections: u32,
}

/// Elasticsearch target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Base URL (ELASTICSEARCH_URL overrides the built-in default)
    #[serde(default = "default_elasticsearch_url")]
    pub url: String,

    /// Target index name
    #[serde(default = "default_index_name")]
    pub index: String,

    /// Request timeout in seconds
    #[serde(default = "default_elasticsearch_timeout")]
    pub timeout_secs: u64,
}

/// Sync loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds to sleep between cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Changed rows fetched per table per cycle
    #[serde(default = "default_page_size")]
    pub page_size: i64,

    /// Join rows pulled from the cursor per batch
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,

    /// Films per bulk request during the initial full load
    #[serde(default = "default_bootstrap_batch_size")]
    pub bootstrap_batch_size: i64,

    /// Checkpoint file path (defaults next to the config dir)
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

/// Connection retry backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay in milliseconds
    #[serde(default = "default_backoff_start_ms")]
    pub start_ms: u64,

    /// Multiplier applied per attempt
    #[serde(default = "default_backoff_factor")]
    pub factor: f64,

    /// Delay ceiling in milliseconds
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: default_postgres_url(),
            schema: default_postgres_schema(),
            max_connections: default_postgres_max_connections(),
        }
    }
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: default_elasticsearch_url(),
            index: default_index_name(),
            timeout_secs: default_elasticsearch_timeout(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            page_size: default_page_size(),
            fetch_batch_size: default_fetch_batch_size(),
            bootstrap_batch_size: default_bootstrap_batch_size(),
            state_file: None,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            start_ms: default_backoff_start_ms(),
            factor: default_backoff_factor(),
            max_ms: default_backoff_max_ms(),
        }
    }
}

impl Config {
    /// Get the default base directory for cinesync (~/.cinesync)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cinesync")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location, falling back to
    /// built-in defaults when no config file exists
    pub fn load_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No config file found, using defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Resolve the checkpoint file path
    pub fn state_file(&self) -> PathBuf {
        self.sync
            .state_file
            .clone()
            .unwrap_or_else(|| Self::default_base_dir().join("checkpoints.json"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sync.page_size <= 0 {
            return Err(Error::Config("sync.page_size must be positive".to_string()));
        }

        if self.sync.fetch_batch_size == 0 {
            return Err(Error::Config(
                "sync.fetch_batch_size must be positive".to_string(),
            ));
        }

        if self.sync.bootstrap_batch_size <= 0 {
            return Err(Error::Config(
                "sync.bootstrap_batch_size must be positive".to_string(),
            ));
        }

        if self.backoff.factor < 1.0 {
            return Err(Error::Config("backoff.factor must be >= 1.0".to_string()));
        }

        if self.backoff.max_ms < self.backoff.start_ms {
            return Err(Error::Config(
                "backoff.max_ms must be >= backoff.start_ms".to_string(),
            ));
        }

        if self.postgres.schema.is_empty() {
            return Err(Error::Config("postgres.schema must not be empty".to_string()));
        }

        Ok(())
    }
}
