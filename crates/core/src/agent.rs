//! Agent configuration passed explicitly into the loop at turn start.

use serde::{Deserialize, Serialize};

/// Everything the loop needs to know about the active agent for one turn.
///
/// Built once by the caller (usually from `AppConfig`) and never re-read
/// from shared settings mid-turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model to request
    pub model_id: String,

    /// Sampling temperature
    #[serde(default = "default_temp")]
    pub temperature: f32,

    /// Maximum tokens per model response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Maximum history messages forwarded per model call
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Safety cap on model calls per user turn
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Tools the model may call. Empty means every tool the executor offers.
    #[serde(default)]
    pub enabled_tools: Vec<String>,

    /// Persona / system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

fn default_temp() -> f32 {
    0.7
}
fn default_context_window() -> usize {
    20
}
fn default_max_turns() -> u32 {
    25
}

impl AgentConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            temperature: default_temp(),
            max_tokens: None,
            context_window: default_context_window(),
            max_turns: default_max_turns(),
            enabled_tools: Vec::new(),
            persona: None,
        }
    }

    /// Whether the named tool may be called under this configuration.
    pub fn tool_enabled(&self, name: &str) -> bool {
        self.enabled_tools.is_empty() || self.enabled_tools.iter().any(|t| t == name)
    }
}
