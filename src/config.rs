//! Configuration loading and defaults.
//!
//! Resolution order, lowest to highest precedence:
//! config file (`~/.llm-cache/config.json`) → `LLM_CACHE_*` environment
//! variables → CLI flags (applied by the command handlers).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Upstream API provider. Decides the default target URL and chat path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat completions (`/v1/chat/completions`).
    #[default]
    Openai,
    /// Anthropic messages API (`/v1/messages`).
    Anthropic,
}

impl Provider {
    /// Default API base URL for this provider.
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Openai => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Chat endpoint path relative to the base URL.
    pub fn chat_path(&self) -> &'static str {
        match self {
            Provider::Openai => "/chat/completions",
            Provider::Anthropic => "/messages",
        }
    }

    /// Parse a provider name as accepted on the CLI.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "openai" => Ok(Provider::Openai),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(CacheError::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Bind address for the proxy server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Where misses are fetched from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API provider (decides the default target URL and chat path).
    pub provider: Provider,
    /// Target base URL override. `None` uses the provider default.
    pub target_url: Option<String>,
}

impl UpstreamConfig {
    /// Resolve the full chat endpoint URL.
    pub fn endpoint_url(&self) -> String {
        let base = self
            .target_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or_else(|| self.provider.base_url());
        format!("{}{}", base, self.provider.chat_path())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite cache database.
    pub storage_path: PathBuf,
    /// Default TTL for cached entries in seconds. `None` disables TTL expiry
    /// (entries remain subject to LRU eviction).
    pub ttl_seconds: Option<u64>,
    /// Maximum number of cached entries. `None` means unbounded.
    pub max_entries: Option<usize>,
    /// Proxy server bind settings.
    pub server: ServerConfig,
    /// Upstream provider settings.
    pub upstream: UpstreamConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: Config::dir().join("cache.db"),
            ttl_seconds: None,
            max_entries: None,
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Config {
    /// Configuration directory: `~/.llm-cache`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".llm-cache")
    }

    /// Path to the config file: `~/.llm-cache/config.json`.
    pub fn path() -> PathBuf {
        Config::dir().join("config.json")
    }

    /// Load configuration from the config file (if present), then apply
    /// `LLM_CACHE_*` environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::fs::read_to_string(Config::path()) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| CacheError::Config(format!("invalid config file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(CacheError::Config(format!("cannot read config file: {e}"))),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `LLM_CACHE_*` environment variable overrides in place.
    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("LLM_CACHE_STORAGE_PATH") {
            self.storage_path = PathBuf::from(path);
        }
        if let Ok(ttl) = std::env::var("LLM_CACHE_TTL_SECONDS") {
            if let Ok(secs) = ttl.parse() {
                self.ttl_seconds = Some(secs);
            }
        }
        if let Ok(max) = std::env::var("LLM_CACHE_MAX_ENTRIES") {
            if let Ok(n) = max.parse() {
                self.max_entries = Some(n);
            }
        }
        if let Ok(host) = std::env::var("LLM_CACHE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LLM_CACHE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(provider) = std::env::var("LLM_CACHE_PROVIDER") {
            if let Ok(p) = Provider::parse(&provider) {
                self.upstream.provider = p;
            }
        }
        if let Ok(url) = std::env::var("LLM_CACHE_TARGET_URL") {
            self.upstream.target_url = Some(url);
        }
    }
}
