//! Configuration loading and typed config structures for the journal.
//!
//! The canonical configuration lives in `driftlog.yaml`. This module defines
//! a strongly-typed struct mirroring the YAML shape and a loader that reads
//! the file and applies environment overrides.

use std::path::Path;

use serde::Deserialize;

/// Environment variable overriding the configured Redis URL.
const REDIS_URL_ENV: &str = "DRIFTLOG_REDIS_URL";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Connection and keyspace settings for one journal instance.
///
/// All fields have defaults so an empty document is a valid configuration
/// for local development.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Redis URL, `redis://host:port` or `redis://host:port/db`.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Logical database index. Overrides any index embedded in the URL.
    #[serde(default)]
    pub database: Option<u8>,

    /// Prefix applied to every key and channel name.
    #[serde(default)]
    pub key_prefix: String,

    /// Maximum number of records fetched per polling read.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_owned()
}

const fn default_page_size() -> usize {
    100
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            database: None,
            key_prefix: String::new(),
            page_size: default_page_size(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DRIFTLOG_REDIS_URL` overrides `redis_url` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(REDIS_URL_ENV) {
            if !url.is_empty() {
                self.redis_url = url;
            }
        }
    }
}
