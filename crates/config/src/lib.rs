//! Configuration loading, validation, and management for Nakshatra.
//!
//! Loads configuration from `~/.nakshatra/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use nakshatra_retrieval::{PipelineConfig, ScoringConfig, Taxonomy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.nakshatra/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model provider name
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model to drive the tool-calling protocol
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Retrieval chain settings
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// Relevance and priority scoring constants
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Topic taxonomy override; the built-in table is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<Taxonomy>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retrieval", &self.retrieval)
            .field("scoring", &self.scoring)
            .field("taxonomy", &self.taxonomy.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// Settings for the retrieval fallback chain and its caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// TTL for assembled response bundles, in seconds
    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,

    /// TTL for raw per-user corpora, in seconds
    #[serde(default = "default_corpus_ttl_secs")]
    pub corpus_ttl_secs: u64,

    /// Top-K for vector search
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    /// Deadline for each backend call, in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Hard cap on chart types per context bundle (unset = no cap)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_context_types: Option<usize>,
}

fn default_response_ttl_secs() -> u64 {
    300
}
fn default_corpus_ttl_secs() -> u64 {
    600
}
fn default_search_top_k() -> usize {
    5
}
fn default_fetch_timeout_ms() -> u64 {
    10_000
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            response_ttl_secs: default_response_ttl_secs(),
            corpus_ttl_secs: default_corpus_ttl_secs(),
            search_top_k: default_search_top_k(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_context_types: None,
        }
    }
}

impl RetrievalSettings {
    /// Translate into the pipeline's runtime configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            search_top_k: self.search_top_k,
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            response_ttl: Duration::from_secs(self.response_ttl_secs),
            corpus_ttl: Duration::from_secs(self.corpus_ttl_secs),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.nakshatra/config.toml).
    ///
    /// Also checks environment variables:
    /// - `NAKSHATRA_API_KEY` (falls back to `OPENROUTER_API_KEY`, `OPENAI_API_KEY`)
    /// - `NAKSHATRA_PROVIDER`
    /// - `NAKSHATRA_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("NAKSHATRA_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("NAKSHATRA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("NAKSHATRA_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".nakshatra")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retrieval.search_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.search_top_k must be at least 1".into(),
            ));
        }

        if self.retrieval.response_ttl_secs == 0 || self.retrieval.corpus_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval TTLs must be greater than zero".into(),
            ));
        }

        if self.retrieval.max_context_types == Some(0) {
            return Err(ConfigError::ValidationError(
                "retrieval.max_context_types must be at least 1 when set".into(),
            ));
        }

        if !(0.0..1.0).contains(&self.scoring.relevance_threshold) {
            return Err(ConfigError::ValidationError(
                "scoring.relevance_threshold must be in [0.0, 1.0)".into(),
            ));
        }

        if self.scoring.min_priority > self.scoring.max_priority {
            return Err(ConfigError::ValidationError(
                "scoring.min_priority must not exceed scoring.max_priority".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retrieval: RetrievalSettings::default(),
            scoring: ScoringConfig::default(),
            taxonomy: None,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
