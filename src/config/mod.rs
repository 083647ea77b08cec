//! Configuration for collection and build runs
//!
//! Configuration is read from an optional JSON file and then overridden by
//! environment variables. Every section has defaults, so an empty (or
//! missing) file yields a working setup against the public npm registry.
//!
//! # Example config.json
//!
//! ```json
//! {
//!   "registry": { "concurrency": 20 },
//!   "collect": { "keywords": ["vite-plugin"], "scopes": ["@vitejs/plugin-"] },
//!   "paths": { "output_dir": "dist/api" }
//! }
//! ```
//!
//! # Environment overrides
//!
//! | Variable                    | Field                       |
//! |-----------------------------|-----------------------------|
//! | `VPR_REGISTRY_URL`          | `registry.url`              |
//! | `VPR_REGISTRY_CONCURRENCY`  | `registry.concurrency`      |
//! | `VPR_METADATA_TIMEOUT_MS`   | `metadata.timeout_ms`       |
//! | `VPR_DATA_DIR`              | `paths.data_dir`            |
//! | `VPR_PATCHES_DIR`           | `paths.patches_dir`         |
//! | `VPR_OUTPUT_DIR`            | `paths.output_dir`          |

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RegistryError, Result};
use crate::npm::client::{DEFAULT_CONCURRENCY, DEFAULT_REGISTRY_URL, DEFAULT_SCOPE_MAX_RESULTS};
use crate::npm::RetryPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub metadata: MetadataConfig,
    pub collect: CollectConfig,
    pub paths: PathsConfig,
}

/// npm registry client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry base URL.
    pub url: String,
    /// Concurrent registry requests.
    pub concurrency: usize,
    /// Ordinary attempts per request.
    pub max_attempts: u32,
    /// Rate-limit responses tolerated per request.
    pub max_rate_limit_events: u32,
    /// Linear backoff step in milliseconds.
    pub retry_step_ms: u64,
    /// Base of the rate-limit backoff in milliseconds.
    pub rate_limit_base_ms: u64,
    /// Ceiling of the rate-limit backoff in milliseconds.
    pub rate_limit_cap_ms: u64,
    /// Optional per-request timeout. Unset means the connection decides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: policy.max_attempts,
            max_rate_limit_events: policy.max_rate_limit_events,
            retry_step_ms: policy.retry_step.as_millis() as u64,
            rate_limit_base_ms: policy.rate_limit_base.as_millis() as u64,
            rate_limit_cap_ms: policy.rate_limit_cap.as_millis() as u64,
            request_timeout_secs: None,
        }
    }
}

impl RegistryConfig {
    /// Retry timing described by this section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            max_rate_limit_events: self.max_rate_limit_events,
            retry_step: Duration::from_millis(self.retry_step_ms),
            rate_limit_base: Duration::from_millis(self.rate_limit_base_ms),
            rate_limit_cap: Duration::from_millis(self.rate_limit_cap_ms),
        }
    }
}

/// Curator metadata fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Concurrent metadata requests.
    pub concurrency: usize,
    /// Hard timeout per metadata request in milliseconds.
    pub timeout_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            timeout_ms: 5000,
        }
    }
}

/// What the collector searches for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Keywords searched with `keywords:<keyword>`.
    pub keywords: Vec<String>,
    /// Name prefixes searched as raw text and filtered by prefix.
    pub scopes: Vec<String>,
    /// Result cap per scope search.
    pub scope_max_results: usize,
    /// Optional result cap per keyword search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results_per_keyword: Option<usize>,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            keywords: vec![
                "vite-plugin".to_string(),
                "rollup-plugin".to_string(),
                "rolldown-plugin".to_string(),
            ],
            scopes: vec!["@rollup/plugin-".to_string()],
            scope_max_results: DEFAULT_SCOPE_MAX_RESULTS,
            max_results_per_keyword: None,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Holds `all.json`, the collected registry dataset.
    pub data_dir: PathBuf,
    /// Holds one JSON file per curator patch.
    pub patches_dir: PathBuf,
    /// Receives `plugins.json` and `plugin-badges.json`.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/plugins"),
            patches_dir: PathBuf::from("data/patches"),
            output_dir: PathBuf::from("docs/public/api"),
        }
    }
}

impl PathsConfig {
    /// Path of the collected dataset.
    pub fn all_plugins_file(&self) -> PathBuf {
        self.data_dir.join("all.json")
    }
}

impl Config {
    /// Load configuration from `path` (if given and present), then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content).map_err(|e| {
                    RegistryError::Config(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Config::default()
            }
            None => Config::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Apply `VPR_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VPR_REGISTRY_URL") {
            self.registry.url = url;
        }
        if let Some(value) = lookup("VPR_REGISTRY_CONCURRENCY") {
            match value.trim().parse() {
                Ok(n) => self.registry.concurrency = n,
                Err(_) => warn!(value = %value, "Ignoring invalid VPR_REGISTRY_CONCURRENCY"),
            }
        }
        if let Some(value) = lookup("VPR_METADATA_TIMEOUT_MS") {
            match value.trim().parse() {
                Ok(n) => self.metadata.timeout_ms = n,
                Err(_) => warn!(value = %value, "Ignoring invalid VPR_METADATA_TIMEOUT_MS"),
            }
        }
        if let Some(dir) = lookup("VPR_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("VPR_PATCHES_DIR") {
            self.paths.patches_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("VPR_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
    }

    /// Reject values the clients cannot work with.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.registry.url).map_err(|e| {
            RegistryError::Config(format!("Invalid registry URL '{}': {}", self.registry.url, e))
        })?;
        if self.registry.concurrency == 0 {
            return Err(RegistryError::Config(
                "registry.concurrency must be at least 1".to_string(),
            ));
        }
        if self.registry.max_attempts == 0 {
            return Err(RegistryError::Config(
                "registry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.metadata.concurrency == 0 {
            return Err(RegistryError::Config(
                "metadata.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
