//! Sync configuration, loaded from TOML.
//!
//! ```toml
//! [cache]
//! root = "/home/me/.limitless/cache"
//!
//! [api]
//! base_url = "https://api.limitless.ai"
//! api_key_env = "LIMITLESS_API_KEY"
//! max_retries = 3
//!
//! [fetch]
//! strategy = "HYBRID"
//! timezone = "America/Detroit"
//! page_limit = 10
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::planner::GapPlanner;
use crate::strategy::StrategyKind;
use lifelog_core::remote::{DEFAULT_PAGE_LIMIT, DEFAULT_TIMEZONE};
use lifelog_core::{FilesystemStore, HttpConfig, QueryParams, RemoteError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest accepted `api.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;
/// Largest accepted `api.retry_base_delay_ms`.
pub const MAX_RETRY_BASE_DELAY_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML, or a value of the wrong type.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Well-formed, but a value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The named environment variable is unset or blank.
    #[error("API key not set: export {0}")]
    MissingApiKey(String),

    /// The HTTP source rejected the key or could not build its client.
    #[error("remote source setup failed: {0}")]
    Remote(#[from] RemoteError),
}

/// Top-level configuration: `[cache]`, `[api]` and `[fetch]` sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub cache: CacheConfig,
    pub api: ApiConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root of the year/month partitioned cache.
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: FilesystemStore::default_root(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_version: String,
    /// Environment variable holding the API key. The key itself never lives
    /// in the config file.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            base_url: http.base_url,
            api_version: http.api_version,
            api_key_env: "LIMITLESS_API_KEY".into(),
            timeout_secs: http.timeout_secs,
            max_retries: http.max_retries,
            retry_base_delay_ms: http.retry_base_delay_ms,
            breaker_cooldown_secs: http.breaker_cooldown_secs,
            breaker_failure_threshold: http.breaker_failure_threshold,
        }
    }
}

impl ApiConfig {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            base_url: self.base_url.clone(),
            api_version: self.api_version.clone(),
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            retry_base_delay_ms: self.retry_base_delay_ms,
            breaker_cooldown_secs: self.breaker_cooldown_secs,
            breaker_failure_threshold: self.breaker_failure_threshold,
        }
    }

    /// Read the API key from `api_key_env`.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub strategy: StrategyKind,
    /// IANA timezone name; decides the execution date.
    pub timezone: String,
    pub page_limit: usize,
    pub include_markdown: bool,
    pub include_headings: bool,
    pub daily_workers: usize,
    pub hybrid_bulk_min_days: usize,
    pub hybrid_bulk_ratio: f64,
    pub hybrid_max_workers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let planner = GapPlanner::default();
        Self {
            strategy: StrategyKind::default(),
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            include_markdown: true,
            include_headings: true,
            daily_workers: 1,
            hybrid_bulk_min_days: planner.min_bulk_days,
            hybrid_bulk_ratio: planner.bulk_ratio,
            hybrid_max_workers: 3,
        }
    }
}

impl FetchConfig {
    pub fn timezone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))
    }

    pub fn query_params(&self) -> Result<QueryParams, ConfigError> {
        Ok(QueryParams {
            timezone: self.timezone()?,
            page_limit: self.page_limit,
            include_markdown: self.include_markdown,
            include_headings: self.include_headings,
        })
    }

    pub fn planner(&self) -> GapPlanner {
        GapPlanner::new(self.hybrid_bulk_min_days, self.hybrid_bulk_ratio)
    }
}

impl SyncConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fetch = &self.fetch;
        if fetch.page_limit == 0 {
            return Err(ConfigError::Invalid("fetch.page_limit must be at least 1".into()));
        }
        if fetch.daily_workers == 0 || fetch.hybrid_max_workers == 0 {
            return Err(ConfigError::Invalid("worker counts must be at least 1".into()));
        }
        if fetch.hybrid_bulk_min_days == 0 {
            return Err(ConfigError::Invalid("fetch.hybrid_bulk_min_days must be at least 1".into()));
        }
        if !(fetch.hybrid_bulk_ratio > 0.0 && fetch.hybrid_bulk_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "fetch.hybrid_bulk_ratio must be in (0, 1], got {}",
                fetch.hybrid_bulk_ratio
            )));
        }
        fetch.timezone()?;
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
        }
        if self.api.api_key_env.trim().is_empty() {
            return Err(ConfigError::Invalid("api.api_key_env must not be empty".into()));
        }
        if self.api.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "api.max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.api.max_retries
            )));
        }
        if self.api.retry_base_delay_ms > MAX_RETRY_BASE_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "api.retry_base_delay_ms must be at most {MAX_RETRY_BASE_DELAY_MS}, got {}",
                self.api.retry_base_delay_ms
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}
