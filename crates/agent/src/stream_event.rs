//! Agent-level streaming events.
//!
//! `AgentStreamEvent` wraps provider-level stream chunks and loop progress
//! into higher-level events that a UI can render as they happen.

use serde::{Deserialize, Serialize};
use stepwise_core::provider::Usage;

/// Events emitted by the agent during a turn.
///
/// - `chunk`       — partial text from the model
/// - `thought`     — reasoning preceding a tool call
/// - `tool_call`   — the agent is invoking a tool
/// - `tool_result` — tool execution completed
/// - `done`        — final answer reached
/// - `step_limit`  — the safety cap on model calls was hit
/// - `cancelled`   — the user stopped the turn
/// - `error`       — the model call failed; the turn is over
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text from the model.
    Chunk { content: String },

    /// A thought preceding a tool call.
    Thought { content: String },

    /// The agent is calling a tool.
    ToolCall {
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        name: String,
        output: String,
        success: bool,
    },

    /// The turn produced its final answer.
    Done {
        conversation_id: String,
        usage: Option<Usage>,
        iterations: usize,
        tool_calls_made: usize,
    },

    /// The turn hit the configured cap on model calls.
    StepLimit { max_turns: u32 },

    /// The turn was stopped by the user.
    Cancelled,

    /// The model call failed.
    Error { message: String },
}

impl AgentStreamEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Thought { .. } => "thought",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::StepLimit { .. } => "step_limit",
            Self::Cancelled => "cancelled",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::StepLimit { .. } | Self::Cancelled | Self::Error { .. }
        )
    }
}
