//! Configuration system for the author feed service
//!
//! Every section is optional. A missing file section falls back to the
//! defaults below, which point at the public sspai.com API.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main service configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub upstream: UpstreamSection,
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Listener settings for the feed and health servers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Bind address (e.g., "0.0.0.0", "127.0.0.1")
    #[serde(default = "default_host")]
    pub host: String,
    /// Port serving `/<author>` feeds
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port serving `/health`, `/ready`, `/live` and `/metrics`
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            health_port: default_health_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_health_port() -> u16 {
    8080
}

/// Upstream article API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamSection {
    /// API root; the listing endpoint is appended to it
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Public site root used for article links and the feed home page
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Per-attempt timeout in milliseconds (default: 5000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries for the count probe (default: 0)
    #[serde(default)]
    pub probe_retries: u32,
    /// Retries for the full listing call (default: 2)
    #[serde(default = "default_full_retries")]
    pub full_retries: u32,
    /// Value of the `error` field that marks a successful response.
    /// The platform uses -1 for success, not 0.
    #[serde(default = "default_success_code")]
    pub success_code: i64,
    /// User-Agent header sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            site_url: default_site_url(),
            timeout_ms: default_timeout_ms(),
            probe_retries: 0,
            full_retries: default_full_retries(),
            success_code: default_success_code(),
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamSection {
    /// Per-attempt timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_api_base_url() -> String {
    "https://sspai.com/api/v1".to_string()
}

fn default_site_url() -> String {
    "https://sspai.com".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_full_retries() -> u32 {
    2
}

fn default_success_code() -> i64 {
    -1
}

fn default_user_agent() -> String {
    format!("authorfeed/{}", env!("CARGO_PKG_VERSION"))
}

/// Rendering options for the generated feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSection {
    /// Prefix for titles of paid articles
    #[serde(default = "default_paid_marker")]
    pub paid_marker: String,
    /// Appended to the author slug to form the feed title
    #[serde(default = "default_title_suffix")]
    pub title_suffix: String,
    /// Appended to the author slug to form the feed description
    #[serde(default = "default_description_suffix")]
    pub description_suffix: String,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            paid_marker: default_paid_marker(),
            title_suffix: default_title_suffix(),
            description_suffix: default_description_suffix(),
        }
    }
}

fn default_paid_marker() -> String {
    "[$] ".to_string()
}

fn default_title_suffix() -> String {
    " - 少数派作者".to_string()
}

fn default_description_suffix() -> String {
    "更新推送".to_string()
}

/// Fallback cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSection {
    #[serde(default)]
    pub backend: CacheBackend,
    /// Directory for the file backend
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            directory: default_cache_directory(),
        }
    }
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from("feed-cache")
}

/// Key-value store behind the fallback cache
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// One JSON file per author under `cache.directory`
    File,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FeedConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FeedConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("upstream.api_base_url", &self.upstream.api_base_url)?;
        validate_url("upstream.site_url", &self.upstream.site_url)?;

        if self.upstream.timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "upstream.timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.server.port == 0 || self.server.health_port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server ports must be non-zero".to_string(),
            ));
        }

        if self.cache.backend == CacheBackend::File && self.cache.directory.as_os_str().is_empty()
        {
            return Err(ConfigError::InvalidConfig(
                "file cache backend requires [cache] directory".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a configuration pointing at a local upstream for unit testing
    #[cfg(test)]
    pub fn test_config(upstream: &str) -> Self {
        let mut config = Self::default();
        config.upstream.api_base_url = format!("{upstream}/api/v1");
        config.upstream.site_url = "https://sspai.com".to_string();
        config.upstream.timeout_ms = 1000;
        config
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidConfig(format!("{field} '{value}' is not a URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidConfig(format!(
            "{field} must use http or https, got '{scheme}'"
        ))),
    }
}
