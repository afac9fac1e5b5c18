//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, Rollover};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `fetch_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0
    /// - any route path does not start with `/`
    /// - `cache_prefix` or `cache_version` is empty
    ///
    /// Returns `ConfigError::Missing` if build rollover has no `build_id`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.has_host() => {}
            Ok(_) => return Err(invalid("origin", "must be an http(s) URL with a host")),
            Err(e) => return Err(invalid("origin", &e.to_string())),
        }

        if self.fetch_timeout_ms < 100 {
            return Err(invalid("fetch_timeout_ms", "must be at least 100ms"));
        }
        if self.fetch_timeout_ms > 300_000 {
            return Err(invalid("fetch_timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.cache_version.is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        let paths = [
            ("manifest_path", &self.manifest_path),
            ("home_path", &self.home_path),
            ("api_prefix", &self.api_prefix),
            ("build_marker", &self.build_marker),
            ("chunk_marker", &self.chunk_marker),
        ];
        for (field, path) in paths {
            if !path.starts_with('/') {
                return Err(invalid(field, "must start with '/'"));
            }
        }
        if let Some(page) = self.precache_pages.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "precache_pages".into(),
                reason: format!("'{page}' must start with '/'"),
            });
        }

        if self.rollover == Rollover::Build {
            self.require_build_id()?;
        }

        if self.precache_pages.is_empty() {
            tracing::warn!("precache_pages is empty; the offline page will list no routes");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_origin_not_url() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_origin_wrong_scheme() {
        let config = AppConfig { origin: "file:///srv/app".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { fetch_timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "fetch_timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { fetch_timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "fetch_timeout_ms"));
    }

    #[test]
    fn test_validate_relative_page() {
        let config = AppConfig { precache_pages: vec!["/".into(), "schedule".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "precache_pages"));
    }

    #[test]
    fn test_validate_relative_api_prefix() {
        let config = AppConfig { api_prefix: "api/".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "api_prefix"));
    }

    #[test]
    fn test_validate_build_rollover_without_id() {
        let config = AppConfig { rollover: Rollover::Build, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "build_id"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { fetch_timeout_ms: 100, max_bytes: 1, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { fetch_timeout_ms: 300_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
