//! Data source configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection pool and data source settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    /// Where to connect. `memdb:<name>` for the in-memory store.
    pub url: String,
    /// Upper bound on physical connections held by the pool.
    pub maximum_pool_size: usize,
    /// Name used in log output.
    pub pool_name: String,
    /// How long `get_connection` waits for a free connection, in milliseconds.
    pub connection_timeout: u64,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            url: "memdb:test".to_string(),
            maximum_pool_size: 10,
            pool_name: "txsync-pool".to_string(),
            connection_timeout: 30_000,
        }
    }
}

impl DataSourceConfig {
    /// Create a configuration for the given url.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Set maximum_pool_size.
    pub fn maximum_pool_size(mut self, value: usize) -> Self {
        self.maximum_pool_size = value;
        self
    }

    /// Set pool_name.
    pub fn pool_name(mut self, value: impl Into<String>) -> Self {
        self.pool_name = value.into();
        self
    }

    /// Set connection_timeout.
    pub fn connection_timeout(mut self, value: Duration) -> Self {
        self.connection_timeout = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// connection_timeout as a `Duration`.
    pub fn connection_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connection_timeout)
    }

    /// Reject settings no pool can work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid("url must not be empty".into()));
        }
        if self.maximum_pool_size == 0 {
            return Err(ConfigError::Invalid("maximum_pool_size must be at least 1".into()));
        }
        if self.connection_timeout == 0 {
            return Err(ConfigError::Invalid("connection_timeout must be positive".into()));
        }
        Ok(())
    }
}
