//! Configuration management for the adapter
//!
//! TOML configuration file support with environment variable overrides and
//! sensible defaults. Every field may be omitted.
//!
//! # Resolution order
//!
//! 1. Explicit path (the `--config` flag)
//! 2. `VZ_GRAFANA_CONFIG` environment variable
//! 3. `./application.toml`
//! 4. Defaults
//!
//! Environment variable overrides are applied on top of whichever source
//! was used.

use crate::backend::ClientConfig;
use crate::error::{Error, Result, ValidationError};
use crate::query::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "VZ_GRAFANA_CONFIG";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "application.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// volkszaehler middleware settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Query engine tuning
    #[serde(default)]
    pub query: QueryConfig,

    /// Entity cache maintenance
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log request and response bodies
    #[serde(default)]
    pub verbose: bool,

    /// CORS allowed origins (empty = any origin)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Middleware base URL
    #[serde(default = "default_api_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Probe for the `/middleware.php` suffix on startup
    #[serde(default = "default_true")]
    pub detect_endpoint: bool,
}

/// Query engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Maximum number of targets fetched concurrently per query
    #[serde(default = "default_max_concurrent_targets")]
    pub max_concurrent_targets: usize,
}

/// Entity cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Populate the entity cache before serving requests
    #[serde(default = "default_true")]
    pub refresh_on_startup: bool,

    /// Background refresh interval in seconds (0 = disabled)
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

// Default value functions
fn default_listen_addr() -> String { "0.0.0.0:8000".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_api_url() -> String { "https://demo.volkszaehler.org/middleware.php".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_concurrent_targets() -> usize { 16 }
fn default_true() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            verbose: false,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            detect_endpoint: true,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_targets: default_max_concurrent_targets(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_on_startup: true,
            refresh_interval_secs: 0,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Resolve the configuration file and load it
    ///
    /// Returns the configuration and the file it came from, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let candidate = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            });

        match candidate {
            Some(path) => {
                let config = Self::from_file_with_env(&path)?;
                Ok((config, Some(path)))
            },
            None => Ok((Self::from_env()?, None)),
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Server
        if let Ok(addr) = std::env::var("VZ_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }

        // Backend
        if let Ok(url) = std::env::var("VZ_API_URL") {
            self.backend.url = url;
        }
        if let Ok(timeout) = std::env::var("VZ_API_TIMEOUT_SECS") {
            self.backend.timeout_secs =
                timeout.parse().map_err(|_| ValidationError::InvalidFormat {
                    field: "VZ_API_TIMEOUT_SECS".to_string(),
                    message: format!("'{}' is not a number of seconds", timeout),
                })?;
        }

        // Query
        if let Ok(limit) = std::env::var("VZ_MAX_CONCURRENT_TARGETS") {
            self.query.max_concurrent_targets =
                limit.parse().map_err(|_| ValidationError::InvalidFormat {
                    field: "VZ_MAX_CONCURRENT_TARGETS".to_string(),
                    message: format!("'{}' is not a positive integer", limit),
                })?;
        }

        // Logging
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.server.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ValidationError::InvalidFormat {
                field: "server.listen_addr".to_string(),
                message: format!("'{}' is not a socket address", self.server.listen_addr),
            }
            .into());
        }

        if self.backend.url.is_empty() {
            return Err(ValidationError::MissingField("backend.url".to_string()).into());
        }
        if !self.backend.url.starts_with("http://") && !self.backend.url.starts_with("https://") {
            return Err(ValidationError::InvalidFormat {
                field: "backend.url".to_string(),
                message: "must start with http:// or https://".to_string(),
            }
            .into());
        }

        if self.backend.timeout_secs == 0 || self.backend.timeout_secs > 3600 {
            return Err(ValidationError::OutOfRange {
                field: "backend.timeout_secs".to_string(),
                value: self.backend.timeout_secs.to_string(),
                min: "1".to_string(),
                max: "3600".to_string(),
            }
            .into());
        }

        if self.query.max_concurrent_targets == 0 || self.query.max_concurrent_targets > 1024 {
            return Err(ValidationError::OutOfRange {
                field: "query.max_concurrent_targets".to_string(),
                value: self.query.max_concurrent_targets.to_string(),
                min: "1".to_string(),
                max: "1024".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Backend client settings
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            url: self.backend.url.clone(),
            timeout: Duration::from_secs(self.backend.timeout_secs),
            verbose: self.server.verbose,
        }
    }

    /// Query engine settings
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent_targets: self.query.max_concurrent_targets,
        }
    }
}
