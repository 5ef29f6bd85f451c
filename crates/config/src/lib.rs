//! Configuration loading, validation, and management for stepwise.
//!
//! Loads configuration from `~/.stepwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stepwise_core::agent::AgentConfig;

/// The root configuration structure.
///
/// Maps directly to `~/.stepwise/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider name (openrouter, openai, ollama, or any OpenAI-compatible endpoint)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Base URL override for the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSection,

    /// Conversation persistence
    #[serde(default)]
    pub store: StoreConfig,
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

/// Redact a secret for Debug output.
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
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("store", &self.store)
            .finish()
    }
}

/// The `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// System instructions prepended to every model call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,

    /// History messages forwarded per model call
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Safety cap on model calls per user turn
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Tools the model may call. Empty = all registered tools.
    #[serde(default)]
    pub enabled_tools: Vec<String>,
}

fn default_context_window() -> usize {
    20
}
fn default_max_turns() -> u32 {
    25
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            persona: None,
            context_window: default_context_window(),
            max_turns: default_max_turns(),
            enabled_tools: vec![],
        }
    }
}

/// Where conversations are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    File,
    Memory,
}

/// The `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Directory for the file backend. Defaults to `~/.stepwise/conversations`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::File
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// Directory used by the file backend.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("conversations"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.stepwise/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `STEPWISE_API_KEY`, then `OPENROUTER_API_KEY`, then `OPENAI_API_KEY`
    /// - `STEPWISE_PROVIDER`, `STEPWISE_MODEL`, `STEPWISE_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
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

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = ["STEPWISE_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY"]
            .into_iter()
            .find_map(&lookup)
        {
            self.api_key = Some(key);
        }
        if let Some(provider) = lookup("STEPWISE_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("STEPWISE_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("STEPWISE_API_URL") {
            self.api_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stepwise")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.context_window == 0 {
            return Err(ConfigError::ValidationError(
                "agent.context_window must be at least 1".into(),
            ));
        }

        if self.agent.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_turns must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The explicit agent configuration handed to the loop at turn start.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model_id: self.default_model.clone(),
            temperature: self.default_temperature,
            max_tokens: Some(self.default_max_tokens),
            context_window: self.agent.context_window,
            max_turns: self.agent.max_turns,
            enabled_tools: self.agent.enabled_tools.clone(),
            persona: self.agent.persona.clone(),
        }
    }

    /// Generate a default config TOML string (for `config init`).
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
            api_url: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentSection::default(),
            store: StoreConfig::default(),
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

impl From<ConfigError> for stepwise_core::Error {
    fn from(err: ConfigError) -> Self {
        stepwise_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.agent.context_window, 20);
        assert_eq!(config.agent.max_turns, 25);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.agent.max_turns, config.agent.max_turns);
    }

    #[test]
    fn invalid_values_rejected() {
        let hot = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(hot.validate().is_err());

        let mut no_window = AppConfig::default();
        no_window.agent.context_window = 0;
        assert!(no_window.validate().is_err());

        let mut no_turns = AppConfig::default();
        no_turns.agent.max_turns = 0;
        assert!(no_turns.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "ollama"
default_model = "llama3.2"

[agent]
persona = "You are terse."
context_window = 8
enabled_tools = ["calculator"]

[store]
backend = "memory"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "ollama");
        assert_eq!(config.agent.context_window, 8);
        assert_eq!(config.agent.max_turns, 25);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn parse_and_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "default_model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));

        std::fs::write(&path, "[agent]\nmax_turns = 0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn env_overrides_in_priority_order() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("OPENROUTER_API_KEY", "sk-router"),
            ("STEPWISE_MODEL", "gpt-4o"),
            ("STEPWISE_API_URL", "http://localhost:8080/v1"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("sk-router"));
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.default_provider, "openrouter");

        config.apply_env(env(&[
            ("STEPWISE_API_KEY", "sk-own"),
            ("STEPWISE_PROVIDER", "openai"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("sk-own"));
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret-value".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn agent_config_carries_settings() {
        let mut config = AppConfig::default();
        config.agent.persona = Some("Be brief.".into());
        config.agent.enabled_tools = vec!["calculator".into()];

        let agent = config.agent_config();
        assert_eq!(agent.model_id, config.default_model);
        assert_eq!(agent.max_tokens, Some(4096));
        assert_eq!(agent.persona.as_deref(), Some("Be brief."));
        assert!(agent.tool_enabled("calculator"));
        assert!(!agent.tool_enabled("current_time"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("backend = \"file\""));
    }
}
