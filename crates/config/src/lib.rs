//! Configuration loading, validation, and management for ragstream.
//!
//! Loads configuration from an optional TOML file with environment
//! variable overrides. Validated once at startup, then shared read-only.

use ragstream_core::PayloadEncoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `backend.endpoint`.
pub const ENV_ENDPOINT: &str = "vLLM_ENDPOINT";
/// Environment variable overriding `backend.model`.
pub const ENV_MODEL: &str = "LLM_MODEL";
/// Environment variable overriding `logging.log_flag`.
pub const ENV_LOG_FLAG: &str = "LOGFLAG";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// HTTP listener
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Streaming wire format
    #[serde(default)]
    pub stream: StreamConfig,

    /// Diagnostic logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the vLLM server, without the `/v1` suffix.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Sent as the bearer token. vLLM trusts the network, so this is a placeholder.
    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whole-request limit for blocking completions.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Longest silence tolerated between two streamed chunks.
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,

    /// Capacity of the fragment channel between reader task and assembler.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_endpoint() -> String {
    "http://localhost:8008".into()
}
fn default_model() -> String {
    "meta-llama/Meta-Llama-3-8B-Instruct".into()
}
fn default_api_key() -> String {
    "EMPTY".into()
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_stream_idle_timeout_secs() -> u64 {
    60
}
fn default_stream_buffer() -> usize {
    64
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: default_api_key(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("stream_idle_timeout_secs", &self.stream_idle_timeout_secs)
            .field("stream_buffer", &self.stream_buffer)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    9000
}
fn default_body_limit_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub payload_encoding: PayloadEncoding,

    /// Write an `event: error` record before `[DONE]` when the backend fails.
    #[serde(default = "default_true")]
    pub emit_error_event: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            payload_encoding: PayloadEncoding::default(),
            emit_error_event: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log requests, composed prompts and full responses at info level.
    #[serde(default)]
    pub log_flag: bool,
}

impl AppConfig {
    /// Load configuration from `path` (if any), then apply environment
    /// overrides:
    /// - `vLLM_ENDPOINT`: backend endpoint
    /// - `LLM_MODEL`: backend model
    /// - `LOGFLAG`: diagnostic logging
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// `load` with overrides read through `lookup`. The file is validated
    /// only after the overrides are applied.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a specific file path, without
    /// environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides read through `lookup` (the process environment in
    /// production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.backend.endpoint = endpoint;
        }

        if let Some(model) = lookup(ENV_MODEL) {
            self.backend.model = model;
        }

        if let Some(flag) = lookup(ENV_LOG_FLAG) {
            self.logging.log_flag = is_truthy(&flag);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = &self.backend.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "backend.endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }

        if self.backend.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.model must not be empty".into(),
            ));
        }

        if self.backend.connect_timeout_secs == 0
            || self.backend.request_timeout_secs == 0
            || self.backend.stream_idle_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "backend timeouts must be greater than 0".into(),
            ));
        }

        if self.backend.stream_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "backend.stream_buffer must be greater than 0".into(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.port must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Listener address as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Any value except empty, `0`, `false`, `no` and `off` turns a flag on.
fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
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

impl From<ConfigError> for ragstream_core::Error {
    fn from(err: ConfigError) -> Self {
        ragstream_core::Error::Config {
            message: err.to_string(),
        }
    }
}
