//! Configuration loading, validation, and management for ToolLoop.
//!
//! Loads configuration from `~/.toolloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toolloop_core::provider::ResponseMode;

/// The root configuration structure.
///
/// Maps directly to `~/.toolloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Endpoint override for the default provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per LLM response; unset leaves it to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Orchestrator settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Review command settings
    #[serde(default)]
    pub review: ReviewConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
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
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("base_url", &self.base_url)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("review", &self.review)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Orchestrator loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum model-invocation rounds per session
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Buffered or streamed delivery
    #[serde(default)]
    pub response_mode: ResponseMode,

    /// Per-call tool timeout; a timed-out call becomes a failed result
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_steps() -> u32 {
    20
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            response_mode: ResponseMode::default(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Replace the built-in reviewer system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Retries for transient backend errors (3 when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolloop/config.toml).
    ///
    /// Environment overrides, highest priority first:
    /// - `TOOLLOOP_API_KEY`, then `OPENAI_API_KEY` (only if no key in file)
    /// - `TOOLLOOP_MODEL`, then `OPENAI_MODEL_NAME`
    /// - `TOOLLOOP_BASE_URL`, then `OPENAI_BASE_URL`
    /// - `TOOLLOOP_PROVIDER`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().find_map(|k| var(*k).filter(|v| !v.is_empty()));

        if self.api_key.is_none() {
            self.api_key = first(&["TOOLLOOP_API_KEY", "OPENAI_API_KEY"]);
        }
        if let Some(model) = first(&["TOOLLOOP_MODEL", "OPENAI_MODEL_NAME"]) {
            self.default_model = model;
        }
        if let Some(url) = first(&["TOOLLOOP_BASE_URL", "OPENAI_BASE_URL"]) {
            self.base_url = Some(url);
        }
        if let Some(provider) = first(&["TOOLLOOP_PROVIDER"]) {
            self.default_provider = provider;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolloop")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// A copy with every API key masked, safe to print.
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]".to_string());
        let mut config = self.clone();
        config.api_key = mask(&self.api_key);
        for provider in config.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
        }
        config
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
            default_provider: default_provider(),
            default_model: default_model(),
            base_url: None,
            default_temperature: default_temperature(),
            default_max_tokens: None,
            agent: AgentSettings::default(),
            review: ReviewConfig::default(),
            providers: HashMap::new(),
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

impl From<ConfigError> for toolloop_core::Error {
    fn from(err: ConfigError) -> Self {
        toolloop_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.agent.response_mode, ResponseMode::Streamed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.agent.max_steps, config.agent.max_steps);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_steps_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
    }

    #[test]
    fn load_from_file_reads_agent_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "qwen2.5"
base_url = "http://localhost:11434/v1"

[agent]
max_steps = 4
response_mode = "buffered"

[providers.ollama]
max_retries = 2
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "qwen2.5");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.agent.max_steps, 4);
        assert_eq!(config.agent.response_mode, ResponseMode::Buffered);
        assert_eq!(config.agent.tool_timeout_secs, 30);
        assert_eq!(config.providers["ollama"].max_retries, Some(2));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_model = [").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("TOOLLOOP_MODEL", "gpt-4o"),
            ("OPENAI_MODEL_NAME", "ignored"),
            ("OPENAI_BASE_URL", "https://proxy.example/v1"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.base_url.as_deref(), Some("https://proxy.example/v1"));
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|k| (k == "OPENAI_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("max_steps"));
    }

    #[test]
    fn redacted_masks_every_key() {
        let mut config = AppConfig {
            api_key: Some("sk-top".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openrouter".into(),
            ProviderConfig {
                api_key: Some("sk-or-nested".into()),
                ..ProviderConfig::default()
            },
        );

        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-top"));
        assert!(!shown.contains("sk-or-nested"));
        assert!(shown.contains("[REDACTED]"));
    }
}
