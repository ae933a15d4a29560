//! Configuration types shared across crates.

use crate::{CACHE_TTL_SECS, LOCK_STALE_SECS, MAX_LYRICS_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum lyrics length accepted in a translation request, in characters.
    #[serde(default = "default_max_lyrics_length")]
    pub max_lyrics_length: usize,
    /// Seconds a client is told to wait before polling an in-progress translation.
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,
    /// Origins allowed by the CORS layer. Preflight requests are answered for any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_max_lyrics_length() -> usize {
    MAX_LYRICS_LENGTH
}

fn default_retry_after_secs() -> u64 {
    30
}

fn default_allowed_origins() -> Vec<String> {
    vec!["https://xpui.app.spotify.com".to_string()]
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_lyrics_length: default_max_lyrics_length(),
            retry_after_secs: default_retry_after_secs(),
            allowed_origins: default_allowed_origins(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_lyrics_length == 0 {
            return Err("server.max_lyrics_length must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Cache and lock storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory of the `<artist>/<title>/` tree.
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
    /// Lifetime of a cache entry in seconds (default: 30 days).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Age in seconds after which a lock is treated as abandoned (default: 30 minutes).
    /// Must cover the upstream timeout plus the cache write.
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_ttl_secs() -> u64 {
    CACHE_TTL_SECS
}

fn default_lock_stale_secs() -> u64 {
    LOCK_STALE_SECS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            ttl_secs: default_ttl_secs(),
            lock_stale_secs: default_lock_stale_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("cache.ttl_secs must be greater than 0".to_string());
        }
        if self.lock_stale_secs == 0 {
            return Err("cache.lock_stale_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Upstream generative API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key. Falls back to the GEMINI_API_KEY env var at startup if not set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// API base URL.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    /// Model name used in the generateContent path.
    #[serde(default = "default_gemini_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gemini_temperature")]
    pub temperature: f32,
    #[serde(default = "default_gemini_max_output_tokens")]
    pub max_output_tokens: u32,
    /// User-Agent header sent upstream.
    #[serde(default = "default_gemini_user_agent")]
    pub user_agent: String,
}

// Hand-written so the API key never lands in logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_timeout_secs() -> u64 {
    30
}

fn default_gemini_temperature() -> f32 {
    1.0
}

fn default_gemini_max_output_tokens() -> u32 {
    20_000
}

fn default_gemini_user_agent() -> String {
    "Spicetify-LyricsPlus-Server/1.0".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            timeout_secs: default_gemini_timeout_secs(),
            temperature: default_gemini_temperature(),
            max_output_tokens: default_gemini_max_output_tokens(),
            user_agent: default_gemini_user_agent(),
        }
    }
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("gemini.timeout_secs must be greater than 0".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("gemini.model must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "gemini.temperature {} is outside the accepted range 0.0..=2.0",
                self.temperature
            ));
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

impl AppConfig {
    /// Create a test configuration rooted at `cache_root`.
    ///
    /// **For testing only.** Uses a dummy API key.
    pub fn for_testing(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig {
                root: cache_root.into(),
                ..Default::default()
            },
            gemini: GeminiConfig {
                api_key: Some("test-api-key".to_string()),
                ..Default::default()
            },
        }
    }

    /// Validate every section, failing on the first invalid one.
    pub fn validate(&self) -> crate::Result<()> {
        self.server
            .validate()
            .and_then(|_| self.cache.validate())
            .and_then(|_| self.gemini.validate())
            .map_err(crate::Error::Config)
    }

    /// Fill `gemini.api_key` from `key` when it is not configured.
    pub fn with_fallback_api_key(mut self, key: Option<String>) -> Self {
        if self.gemini.api_key.is_none() {
            self.gemini.api_key = key.filter(|k| !k.trim().is_empty());
        }
        self
    }
}
