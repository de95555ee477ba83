//! Configuration loading, validation, and management for tabletalk.
//!
//! Loads configuration from `tabletalk.toml` with environment variable
//! overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// The root configuration structure.
///
/// Maps directly to `tabletalk.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Model endpoint configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Grounding cache and fetch configuration
    #[serde(default)]
    pub grounding: GroundingConfig,

    /// Reasoning loop and prompt configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat-completions style endpoint base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cutoff
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum tokens per model response
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_top_p() -> f32 {
    0.95
}
fn default_max_output_tokens() -> u32 {
    4096
}
fn default_model_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingConfig {
    /// Tables to ground against. Empty = all base tables in the dataset.
    #[serde(default)]
    pub table_names: Vec<String>,

    /// Full id of the table holding data-profile rows. Empty = profiles
    /// unavailable, sample rows are used instead.
    #[serde(default)]
    pub profiles_table_id: String,

    /// Sample rows fetched per table when profiles are unavailable
    #[serde(default = "default_sample_row_limit")]
    pub sample_row_limit: usize,

    /// Cache TTL for grounding entries, in seconds
    #[serde(default = "default_grounding_ttl_secs")]
    pub ttl_secs: u64,

    /// Per-fetch timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_sample_row_limit() -> usize {
    3
}
fn default_grounding_ttl_secs() -> u64 {
    3600
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            table_names: vec![],
            profiles_table_id: String::new(),
            sample_row_limit: default_sample_row_limit(),
            ttl_secs: default_grounding_ttl_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl GroundingConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum steps (model calls + tool calls) per reasoning loop
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Maximum tool calls within one turn (cycle breaker)
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls_per_turn: u32,

    /// Prompt budget in estimated tokens
    #[serde(default = "default_prompt_budget")]
    pub prompt_budget_tokens: usize,

    /// Prefix the model uses to mark a clarifying question
    #[serde(default = "default_clarification_marker")]
    pub clarification_marker: String,

    /// Per-tool-call timeout in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Retry attempts for transient tool failures
    #[serde(default = "default_retry_attempts")]
    pub tool_retry_attempts: u32,

    /// Base delay for exponential backoff, in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub tool_retry_base_delay_ms: u64,
}

fn default_max_steps() -> u32 {
    20
}
fn default_max_tool_calls() -> u32 {
    8
}
fn default_prompt_budget() -> usize {
    16384
}
fn default_clarification_marker() -> String {
    "CLARIFY:".into()
}
fn default_tool_timeout_secs() -> u64 {
    60
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    250
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_tool_calls_per_turn: default_max_tool_calls(),
            prompt_budget_tokens: default_prompt_budget(),
            clarification_marker: default_clarification_marker(),
            tool_timeout_secs: default_tool_timeout_secs(),
            tool_retry_attempts: default_retry_attempts(),
            tool_retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl AgentConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn tool_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.tool_retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// TTL for the cached /api/tables responses, in seconds
    #[serde(default = "default_tables_cache_ttl_secs")]
    pub tables_cache_ttl_secs: u64,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_tables_cache_ttl_secs() -> u64 {
    3600
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            tables_cache_ttl_secs: default_tables_cache_ttl_secs(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("grounding", &self.grounding)
            .field("agent", &self.agent)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl AppConfig {
    /// Load configuration from `tabletalk.toml` in the working directory.
    ///
    /// Environment variables take priority over the file:
    /// - `TABLETALK_API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - `TABLETALK_MODEL`
    /// - `TABLETALK_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("tabletalk.toml"))?;

        if config.model.api_key.is_none() {
            config.model.api_key = std::env::var("TABLETALK_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("TABLETALK_MODEL") {
            config.model.model = model;
        }

        if let Ok(url) = std::env::var("TABLETALK_API_URL") {
            config.model.api_url = url;
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

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.model.top_p <= 0.0 || self.model.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "model.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.agent.max_tool_calls_per_turn == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_calls_per_turn must be at least 1".into(),
            ));
        }

        if self.agent.prompt_budget_tokens < 256 {
            return Err(ConfigError::ValidationError(
                "agent.prompt_budget_tokens must be at least 256".into(),
            ));
        }

        if self.grounding.sample_row_limit == 0 {
            return Err(ConfigError::ValidationError(
                "grounding.sample_row_limit must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
            || std::env::var("TABLETALK_API_KEY").is_ok()
            || std::env::var("OPENAI_API_KEY").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.grounding.sample_row_limit, 3);
        assert_eq!(config.agent.clarification_marker, "CLARIFY:");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/tabletalk.toml")).unwrap();
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn load_from_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tabletalk.toml");
        fs::write(
            &path,
            r#"
[model]
model = "gemini-2.5-pro"
temperature = 0.2

[grounding]
table_names = ["orders", "products"]
ttl_secs = 600

[agent]
max_steps = 12

[gateway]
port = 9090
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model.model, "gemini-2.5-pro");
        assert!((config.model.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.grounding.table_names.len(), 2);
        assert_eq!(config.grounding.ttl(), Duration::from_secs(600));
        assert_eq!(config.agent.max_steps, 12);
        assert_eq!(config.gateway.port, 9090);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tabletalk.toml");
        fs::write(&path, "[model]\ntemperature = 5.0\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn zero_steps_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-secret-key".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn api_key_detected_from_config() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-key".into());
        assert!(config.has_api_key());
    }
}
