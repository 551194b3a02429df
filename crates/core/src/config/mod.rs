//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LINKPEEK_*)
//! 2. TOML config file (if LINKPEEK_CONFIG_FILE set)
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

/// One day, the shortest allowed cache TTL.
pub const MIN_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// One year, the longest allowed cache TTL and the default.
pub const MAX_CACHE_TTL_SECS: u64 = 365 * MIN_CACHE_TTL_SECS;

/// Open Graph properties kept in a preview unless configured otherwise.
pub const DEFAULT_PREVIEW_PROPERTIES: &[&str] = &["image", "site_name", "title", "description", "locale"];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LINKPEEK_*)
/// 2. TOML config file (if LINKPEEK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via LINKPEEK_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for outbound link checks.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Site home URL, sent as the Referer of every check.
    ///
    /// Set via LINKPEEK_HOME_URL environment variable.
    #[serde(default)]
    pub home_url: Option<String>,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum body bytes read per response; the rest is discarded.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Seconds between scheduler sweeps.
    ///
    /// Set via LINKPEEK_SWEEP_INTERVAL_SECS environment variable.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Most link checks in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// How long a resolved entry stays cached, in seconds.
    ///
    /// Set via LINKPEEK_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Open Graph properties (without the `og:` prefix) kept in previews.
    #[serde(default = "default_preview_properties")]
    pub preview_properties: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./linkpeek-cache.sqlite")
}

fn default_user_agent() -> String {
    "linkpeek/0.1".into()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_bytes() -> usize {
    1_048_576 // 1MB
}

fn default_sweep_interval_secs() -> u64 {
    90
}

fn default_max_concurrency() -> usize {
    16
}

fn default_cache_ttl_secs() -> u64 {
    MAX_CACHE_TTL_SECS
}

fn default_preview_properties() -> Vec<String> {
    DEFAULT_PREVIEW_PROPERTIES.iter().map(|p| p.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            home_url: None,
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_concurrency: default_max_concurrency(),
            cache_ttl_secs: default_cache_ttl_secs(),
            preview_properties: default_preview_properties(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LINKPEEK_`
    /// 2. TOML file from `LINKPEEK_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("LINKPEEK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(
            figment.merge(
                Env::prefixed("LINKPEEK_")
                    .ignore(&["config_file"])
                    .map(|key| key.as_str().to_lowercase().into())
                    .split("__"),
            ),
        )
    }

    /// Extract and validate a configuration from an assembled figment.
    pub fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
