//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CLUBSYNC_*)
//! 2. TOML config file (if CLUBSYNC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CLUBSYNC_*)
/// 2. TOML config file (if CLUBSYNC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the backend API.
    ///
    /// Set via CLUBSYNC_API_BASE_URL environment variable.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Path to the SQLite key/value store.
    ///
    /// Set via CLUBSYNC_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via CLUBSYNC_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Cached club value freshness window in milliseconds.
    ///
    /// Set via CLUBSYNC_TTL_MS environment variable.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Minimum spacing between dispatches in milliseconds.
    ///
    /// Set via CLUBSYNC_MIN_INTERVAL_MS environment variable.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Fixed delay before the single 5xx retry, in milliseconds.
    ///
    /// Set via CLUBSYNC_RETRY_DELAY_MS environment variable.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Fallback wait in seconds when a 429 carries no Retry-After header.
    ///
    /// Set via CLUBSYNC_DEFAULT_RETRY_AFTER_SECS environment variable.
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via CLUBSYNC_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:8000/api".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./clubsync.sqlite")
}

fn default_user_agent() -> String {
    "clubsync/0.1".into()
}

fn default_ttl_ms() -> u64 {
    30_000
}

fn default_min_interval_ms() -> u64 {
    1_000
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_retry_after_secs() -> u64 {
    2
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            ttl_ms: default_ttl_ms(),
            min_interval_ms: default_min_interval_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            default_retry_after_secs: default_retry_after_secs(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Freshness window as Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Minimum dispatch spacing as Duration.
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// 5xx retry delay as Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CLUBSYNC_`
    /// 2. TOML file from `CLUBSYNC_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CLUBSYNC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CLUBSYNC_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
