//! Runtime configuration for semantic-cache-tier.
//!
//! Configuration is loaded from a JSON file (every section optional), then
//! selected environment variables override individual fields. All cache knobs
//! (capacity, threshold, admission rules) live here.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::admission::{DEFAULT_DENY_PHRASES, DEFAULT_MIN_RESPONSE_CHARS};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "semantic-cache-tier", about = "Tiered exact + semantic prompt cache server")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("cache.similarity_threshold must be within [0, 1], got {0}")]
    Threshold(f64),

    #[error("cache.max_size must be at least 1")]
    MaxSize,

    #[error("cache.generation_cost_secs must be a non-negative number, got {0}")]
    GenerationCost(f64),

    #[error("cache.provider_timeout_secs must be at least 1")]
    ProviderTimeout,

    #[error(
        "server.request_timeout_secs ({request}) must cover one generation and two embedding \
         calls ({min} = 3 x cache.provider_timeout_secs)"
    )]
    RequestTimeout { request: u64, min: u64 },

    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub admission: AdmissionConfig,
    pub exact_store: ExactStoreConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8000").
    pub listen: String,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Tiered cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of semantic-tier entries (`CACHE_MAX_SIZE`).
    pub max_size: usize,

    /// Minimum similarity for a semantic hit (`CACHE_THRESHOLD`).
    pub similarity_threshold: f64,

    /// Typical generation latency in seconds, used for latency-saved accounting.
    pub generation_cost_secs: f64,

    /// Per provider call timeout in seconds.
    pub provider_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            similarity_threshold: 0.60,
            generation_cost_secs: 2.5,
            provider_timeout_secs: 30,
        }
    }
}

/// Admission policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Responses shorter than this (in characters) are not cached.
    pub min_response_chars: usize,

    /// Case-insensitive substrings that mark a response as a hedge or refusal.
    pub deny_phrases: Vec<String>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            min_response_chars: DEFAULT_MIN_RESPONSE_CHARS,
            deny_phrases: DEFAULT_DENY_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExactBackend {
    Memory,
    Redis,
}

/// Tier 1 backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactStoreConfig {
    pub backend: ExactBackend,

    /// Redis connection URL.
    pub redis_url: String,

    /// Optional namespace prepended to Redis keys.
    pub key_prefix: Option<String>,
}

impl Default for ExactStoreConfig {
    fn default() -> Self {
        Self {
            backend: ExactBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: None,
        }
    }
}

/// Embedding provider (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "bge-large".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    Gemini,
    OpenAi,
}

/// Generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: GenerationBackend,

    /// Base URL; `None` uses the backend's public endpoint.
    pub base_url: Option<String>,

    pub model: String,

    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackend::Gemini,
            base_url: None,
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (testable without touching the process env).
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { var, value })
        }

        if let Some(v) = lookup("CACHE_MAX_SIZE") {
            self.cache.max_size = parse("CACHE_MAX_SIZE", v)?;
        }
        if let Some(v) = lookup("CACHE_THRESHOLD") {
            self.cache.similarity_threshold = parse("CACHE_THRESHOLD", v)?;
        }
        if let Some(v) = lookup("GENERATION_COST_SECS") {
            self.cache.generation_cost_secs = parse("GENERATION_COST_SECS", v)?;
        }

        let redis_host = lookup("REDIS_HOST");
        let redis_port = lookup("REDIS_PORT");
        if redis_host.is_some() || redis_port.is_some() {
            let host = redis_host.unwrap_or_else(|| "localhost".to_string());
            let port: u16 = match redis_port {
                Some(p) => parse("REDIS_PORT", p)?,
                None => 6379,
            };
            self.exact_store.backend = ExactBackend::Redis;
            self.exact_store.redis_url = format!("redis://{host}:{port}");
        }

        if let Some(v) = lookup("EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = lookup("GENERATION_BASE_URL") {
            self.generation.base_url = Some(v);
        }
        if let Some(v) = lookup("GENERATION_MODEL") {
            self.generation.model = v;
        }

        match self.generation.backend {
            GenerationBackend::Gemini => {
                if let Some(key) = lookup("GOOGLE_API_KEY") {
                    self.generation.api_key = Some(key);
                }
            }
            GenerationBackend::OpenAi => {
                if let Some(key) = lookup("OPENAI_API_KEY") {
                    self.generation.api_key = Some(key);
                }
            }
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = lookup("OPENAI_API_KEY");
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.cache.similarity_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::Threshold(t));
        }
        if self.cache.max_size == 0 {
            return Err(ConfigError::MaxSize);
        }
        let cost = self.cache.generation_cost_secs;
        if !cost.is_finite() || cost < 0.0 {
            return Err(ConfigError::GenerationCost(cost));
        }
        let provider = self.cache.provider_timeout_secs;
        if provider == 0 {
            return Err(ConfigError::ProviderTimeout);
        }
        let min = provider.saturating_mul(3);
        if self.server.request_timeout_secs < min {
            return Err(ConfigError::RequestTimeout {
                request: self.server.request_timeout_secs,
                min,
            });
        }
        Ok(())
    }
}
