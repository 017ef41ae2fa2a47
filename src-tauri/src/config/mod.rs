use crate::session::ProgressPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "HASKE_ENDPOINT";
pub const ENV_TICK_INTERVAL_MS: &str = "HASKE_TICK_INTERVAL_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "HASKE_REQUEST_TIMEOUT_SECS";

/// Runtime settings for the processing client.
///
/// Resolved in layers: defaults, then `config.json` in the user config
/// directory, then environment variables. Front ends may override further.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Full URL the multipart submission is posted to
    pub endpoint: String,
    pub tick_interval_ms: u64,
    pub tick_step: u8,
    /// Highest percentage reachable before the result has arrived
    pub progress_ceiling: u8,
    /// `None` waits for the server indefinitely
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/process".to_string(),
            tick_interval_ms: 500,
            tick_step: 10,
            progress_ceiling: 90,
            request_timeout_secs: Some(300),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from the default file location and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "Loading config file");
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };

        config.with_env(|key| std::env::var(key).ok())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("haske").join("config.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables, looked up through `lookup`
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }

        if let Some(value) = lookup(ENV_TICK_INTERVAL_MS) {
            self.tick_interval_ms = parse_env(ENV_TICK_INTERVAL_MS, &value)?;
        }

        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            // 0 disables the timeout
            let secs: u64 = parse_env(ENV_REQUEST_TIMEOUT_SECS, &value)?;
            self.request_timeout_secs = (secs > 0).then_some(secs);
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".to_string()));
        }
        if self.tick_step == 0 {
            return Err(ConfigError::Invalid("tick_step must be positive".to_string()));
        }
        if self.progress_ceiling == 0 || self.progress_ceiling >= 100 {
            return Err(ConfigError::Invalid(format!(
                "progress_ceiling must be between 1 and 99, got {}",
                self.progress_ceiling
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn progress_policy(&self) -> ProgressPolicy {
        ProgressPolicy {
            ceiling: self.progress_ceiling,
            tick_step: self.tick_step,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
