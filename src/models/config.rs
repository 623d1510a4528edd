//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable that forces raw response logging on.
pub const LOG_REQUESTS_ENV: &str = "LOG_REQUESTS";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Worker pool and retry settings, shared by both upstreams
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Danbooru endpoint settings
    #[serde(default)]
    pub danbooru: DanbooruConfig,

    /// Gelbooru endpoint settings
    #[serde(default)]
    pub gelbooru: GelbooruConfig,

    /// Echo raw upstream response bodies to the log
    #[serde(default)]
    pub log_requests: bool,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if std::env::var(LOG_REQUESTS_ENV).is_ok_and(|v| v == "1") {
            self.log_requests = true;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("dispatcher.user_agent is empty"));
        }
        if self.dispatcher.timeout_secs == 0 {
            return Err(AppError::validation("dispatcher.timeout_secs must be > 0"));
        }
        if self.dispatcher.workers == 0 {
            return Err(AppError::validation("dispatcher.workers must be > 0"));
        }
        if self.dispatcher.max_attempts == 0 {
            return Err(AppError::validation("dispatcher.max_attempts must be > 0"));
        }
        url::Url::parse(&self.danbooru.base_url)?;
        url::Url::parse(&self.gelbooru.base_url)?;
        url::Url::parse(&self.gelbooru.sample_base_url)?;
        Ok(())
    }
}

/// Fetch dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Number of parallel fetch workers per upstream host
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Attempts per request, including the first one
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts after a transient status, in seconds
    #[serde(default = "defaults::backoff")]
    pub backoff_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl DispatcherConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            max_attempts: defaults::max_attempts(),
            backoff_secs: defaults::backoff(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Danbooru endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DanbooruConfig {
    #[serde(default = "defaults::danbooru_url")]
    pub base_url: String,
}

impl Default for DanbooruConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::danbooru_url(),
        }
    }
}

/// Gelbooru endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GelbooruConfig {
    #[serde(default = "defaults::gelbooru_url")]
    pub base_url: String,

    /// Host serving resized samples, used when a listing omits `sample_url`
    #[serde(default = "defaults::gelbooru_sample_url")]
    pub sample_base_url: String,

    /// Backfill Danbooru-sourced posts from Danbooru
    #[serde(default = "defaults::cross_reference")]
    pub cross_reference: bool,
}

impl Default for GelbooruConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::gelbooru_url(),
            sample_base_url: defaults::gelbooru_sample_url(),
            cross_reference: defaults::cross_reference(),
        }
    }
}

mod defaults {
    // Dispatcher defaults
    pub fn workers() -> usize {
        4
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn backoff() -> u64 {
        10
    }
    pub fn user_agent() -> String {
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Upstream defaults
    pub fn danbooru_url() -> String {
        "https://danbooru.donmai.us".into()
    }
    pub fn gelbooru_url() -> String {
        "https://gelbooru.com".into()
    }
    pub fn gelbooru_sample_url() -> String {
        "https://img3.gelbooru.com".into()
    }
    pub fn cross_reference() -> bool {
        true
    }
}
