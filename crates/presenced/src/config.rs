//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file,
//! then the `PRESENCE_ADDR` environment variable. CLI flags are applied
//! on top by the binary.
//!
//! ```toml
//! bind_addr = "127.0.0.1:8001"
//! tick_interval_ms = 1
//! idle_timeout_ms = 5000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default listening address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8001";

/// Default dispatcher tick interval in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1;

/// Sessions idle for longer than this are evicted.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5000;

/// Environment variable overriding the bind address.
pub const BIND_ADDR_ENV: &str = "PRESENCE_ADDR";

/// Runtime configuration for the presence daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_addr: String,

    /// Sleep between two dispatcher passes
    pub tick_interval_ms: u64,

    /// Idle threshold after which a session is disconnected
    pub idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(addr) = std::env::var(BIND_ADDR_ENV) {
            config.bind_addr = addr;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file. Missing keys take their default value.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parses TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "idle_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "bind_addr",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
