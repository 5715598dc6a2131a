//! Configuration management for the PHAMA chat client.
//!
//! The client reads a single configuration file at `~/.phama/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (PHAMA_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PHAMA_API_URL` → backend.base_url
//! - `PHAMA_DATA_DIR` → storage.data_dir
//! - `PHAMA_LOG_LEVEL` → observability.log_level
//! - `PHAMA_SPEECH_API_KEY` → speech.api_key (falls back to `OPENAI_API_KEY`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".phama"),
        |dirs| dirs.home_dir().join(".phama"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Backend
// ============================================================================

/// Remote chat backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the REST API, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Where the session token is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the data directory. Defaults to the config directory.
    #[serde(default)]
    pub data_dir: Option<String>,
}

// ============================================================================
// Speech
// ============================================================================

/// Speech-to-text settings for voice input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Recognition language (BCP-47).
    #[serde(default = "default_speech_language")]
    pub language: String,

    /// Provider name: "openai", "compatible" or "local". Voice input is
    /// unavailable when unset.
    #[serde(default)]
    pub provider: Option<String>,

    /// Base URL for OpenAI-compatible providers
    #[serde(default)]
    pub base_url: Option<String>,

    /// Transcription model
    #[serde(default = "default_speech_model")]
    pub model: String,

    /// API key for the provider
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: default_speech_language(),
            provider: None,
            base_url: None,
            model: default_speech_model(),
            api_key: None,
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to pin at `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load from `path`, or the default location when `None`, then apply
    /// environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PHAMA_API_URL") {
            self.backend.base_url = url;
        }
        if let Some(dir) = lookup("PHAMA_DATA_DIR") {
            self.storage.data_dir = Some(dir);
        }
        if let Some(level) = lookup("PHAMA_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(key) = lookup("PHAMA_SPEECH_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.speech.api_key = Some(key);
        }
    }

    /// Backend base URL with any trailing slash removed.
    pub fn api_base_url(&self) -> &str {
        self.backend.base_url.trim_end_matches('/')
    }

    /// Directory holding the persisted session.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .as_ref()
            .map_or_else(config_dir, PathBuf::from)
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_speech_language() -> String {
    "pa-IN".into()
}
fn default_speech_model() -> String {
    "whisper-1".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
