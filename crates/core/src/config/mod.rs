//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (COMPANION_*)
//! 2. TOML config file (if COMPANION_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::naming;

mod validation;

pub use validation::ConfigError;

/// What makes the cache generation name change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rollover {
    /// Stamp with the UTC date: a new generation every day.
    #[default]
    Calendar,
    /// Stamp with a digest of `build_id`: a new generation per deployment.
    Build,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (COMPANION_*)
/// 2. TOML config file (if COMPANION_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the controller serves. Requests to any other origin pass through.
    ///
    /// Set via COMPANION_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Fixed prefix of every cache generation name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Controller version component of the generation name.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Generation rollover trigger.
    ///
    /// Set via COMPANION_ROLLOVER environment variable (`calendar` or `build`).
    #[serde(default)]
    pub rollover: Rollover,

    /// Build identifier, required when `rollover = "build"`.
    #[serde(default)]
    pub build_id: Option<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via COMPANION_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upper bound on any single network fetch, in milliseconds.
    ///
    /// Set via COMPANION_FETCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Maximum bytes to accept per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Page routes cached on install and linked from the offline page.
    #[serde(default = "default_precache_pages")]
    pub precache_pages: Vec<String>,

    /// Web-app manifest document, cached on install alongside the pages.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Page served as the last cached fallback for navigations.
    #[serde(default = "default_home_path")]
    pub home_path: String,

    /// Reserved path prefix for API calls. Matched per segment, so `/api/`
    /// covers `/api` and `/api/sessions` but not `/apiary`.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path segment marking build output.
    #[serde(default = "default_build_marker")]
    pub build_marker: String,

    /// Path segment marking code-split chunks inside the build output.
    #[serde(default = "default_chunk_marker")]
    pub chunk_marker: String,

    /// File extensions served cache-first as static media.
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// Background-sync tag that re-caches the page manifest.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_prefix() -> String {
    "icair-companion".into()
}

fn default_cache_version() -> String {
    "v6".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./companion-cache.sqlite")
}

fn default_user_agent() -> String {
    "companion-sw/0.1".into()
}

fn default_fetch_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_precache_pages() -> Vec<String> {
    ["/", "/schedule", "/speakers", "/map", "/hotels", "/more", "/travel-guide", "/travel-checklist"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_manifest_path() -> String {
    "/manifest.json".into()
}

fn default_home_path() -> String {
    "/".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_build_marker() -> String {
    "/_next/".into()
}

fn default_chunk_marker() -> String {
    "/_next/static/chunks/".into()
}

fn default_media_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "woff", "woff2", "ttf", "otf", "eot"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sync_tag() -> String {
    "sync-pages".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            rollover: Rollover::Calendar,
            build_id: None,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_bytes: default_max_bytes(),
            precache_pages: default_precache_pages(),
            manifest_path: default_manifest_path(),
            home_path: default_home_path(),
            api_prefix: default_api_prefix(),
            build_marker: default_build_marker(),
            chunk_marker: default_chunk_marker(),
            media_extensions: default_media_extensions(),
            sync_tag: default_sync_tag(),
        }
    }
}

impl AppConfig {
    /// Fetch bound as Duration for use with reqwest/tokio.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Everything cached on install: the page routes, then the manifest.
    pub fn precache_manifest(&self) -> Vec<String> {
        let mut paths = self.precache_pages.clone();
        if !paths.contains(&self.manifest_path) {
            paths.push(self.manifest_path.clone());
        }
        paths
    }

    /// Name of the cache generation this configuration serves on `today`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if build rollover is selected without a build id.
    pub fn generation_name(&self, today: NaiveDate) -> Result<String, ConfigError> {
        let stamp = match self.rollover {
            Rollover::Calendar => naming::calendar_stamp(today),
            Rollover::Build => naming::build_stamp(self.require_build_id()?),
        };
        Ok(naming::generation_name(&self.cache_prefix, &self.cache_version, &stamp))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `COMPANION_`
    /// 2. TOML file from `COMPANION_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("COMPANION_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("COMPANION_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Build id for build-based rollover.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the build id is not set.
    pub fn require_build_id(&self) -> Result<&str, ConfigError> {
        self.build_id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| ConfigError::Missing {
            field: "build_id".into(),
            hint: "Set COMPANION_BUILD_ID or switch COMPANION_ROLLOVER to calendar".into(),
        })
    }
}
