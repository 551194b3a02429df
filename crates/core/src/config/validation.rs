//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, MAX_CACHE_TTL_SECS, MIN_CACHE_TTL_SECS};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is outside 100ms..=5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `sweep_interval_secs` is outside 1s..=1 day
    /// - `max_concurrency` is outside 1..=256
    /// - `cache_ttl_secs` is outside 1 day..=1 year
    /// - `user_agent` is empty
    /// - `home_url` is set but not an absolute http(s) URL
    /// - a `preview_properties` entry is blank
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if !(1..=86_400).contains(&self.sweep_interval_secs) {
            return Err(invalid("sweep_interval_secs", "must be between 1 second and 1 day"));
        }

        if !(1..=256).contains(&self.max_concurrency) {
            return Err(invalid("max_concurrency", "must be between 1 and 256"));
        }

        if !(MIN_CACHE_TTL_SECS..=MAX_CACHE_TTL_SECS).contains(&self.cache_ttl_secs) {
            return Err(invalid(
                "cache_ttl_secs",
                format!("must be between {MIN_CACHE_TTL_SECS} (1 day) and {MAX_CACHE_TTL_SECS} (1 year)"),
            ));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if let Some(home) = &self.home_url {
            match url::Url::parse(home) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => return Err(invalid("home_url", format!("unsupported scheme: {}", parsed.scheme()))),
                Err(e) => return Err(invalid("home_url", e.to_string())),
            }
        }

        if self.preview_properties.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("preview_properties", "entries must not be blank"));
        }

        if self.preview_properties.is_empty() {
            tracing::warn!("preview_properties is empty; link previews will not be collected");
        }

        Ok(())
    }
}
