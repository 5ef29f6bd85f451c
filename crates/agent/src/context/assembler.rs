//! Context assembly — the message list sent with every model call.
//!
//! Two layers:
//!
//! 1. **System** (persona, tool catalog, retrieved context) — rebuilt fresh for
//!    every call, never deduplicated or truncated
//! 2. **Conversation history** — adjacent duplicates collapsed, then only the
//!    most recent `window` messages kept
//!
//! # Determinism
//!
//! Assembly is deterministic: identical inputs always produce identical
//! outputs. Dedup is a single order-preserving pass; truncation drops oldest.

use serde::{Deserialize, Serialize};
use stepwise_core::message::Message;
use stepwise_core::tool::ToolDefinition;

use crate::protocol;

// ── Types ─────────────────────────────────────────────────────────────────

/// The system-side inputs for one model call.
#[derive(Debug, Clone, Default)]
pub struct SystemContext {
    /// Persona / behavioural instructions.
    pub persona: Option<String>,
    /// Tools the model may call. Empty means no catalog section.
    pub tools: Vec<ToolDefinition>,
    /// Opaque retrieved context from the retrieval collaborator.
    pub retrieved: Option<String>,
}

impl SystemContext {
    /// Render into ordered system messages: persona, tool catalog, retrieved context.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(3);
        if let Some(persona) = self.persona.as_deref().filter(|p| !p.trim().is_empty()) {
            out.push(Message::system(persona));
        }
        if !self.tools.is_empty() {
            out.push(Message::system(protocol::render_tool_catalog(&self.tools)));
        }
        if let Some(retrieved) = self.retrieved.as_deref().filter(|r| !r.trim().is_empty()) {
            out.push(Message::system(retrieved));
        }
        out
    }
}

/// The assembled context, ready for a provider request.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// System messages followed by the bounded history window.
    pub messages: Vec<Message>,
    /// Assembly metadata (counts of what was dropped).
    pub metadata: AssemblyMetadata,
}

/// What assembly did to the history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// System messages prepended.
    pub system_messages: usize,
    /// History length before dedup.
    pub history_total: usize,
    /// Adjacent duplicates removed.
    pub duplicates_dropped: usize,
    /// Oldest messages removed to fit the window.
    pub truncated: usize,
}

// ── Operations ────────────────────────────────────────────────────────────

/// Drop every message whose (role, content) equals the previous kept message.
pub fn deduplicate(messages: &[Message]) -> Vec<Message> {
    let mut kept: Vec<Message> = Vec::with_capacity(messages.len());
    for msg in messages {
        let duplicate = kept
            .last()
            .is_some_and(|prev| prev.role == msg.role && prev.content == msg.content);
        if !duplicate {
            kept.push(msg.clone());
        }
    }
    kept
}

/// Keep only the last `window` messages.
pub fn truncate(mut messages: Vec<Message>, window: usize) -> Vec<Message> {
    if messages.len() > window {
        messages.drain(..messages.len() - window);
    }
    messages
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless — create one and reuse it.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    window: usize,
}

impl ContextAssembler {
    /// Create an assembler forwarding at most `window` history messages.
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// `system ++ truncate(deduplicate(history), window)`.
    pub fn assemble(&self, system: &[Message], history: &[Message]) -> AssembledContext {
        let deduped = deduplicate(history);
        let duplicates_dropped = history.len() - deduped.len();
        let before_truncate = deduped.len();
        let window = truncate(deduped, self.window);

        let metadata = AssemblyMetadata {
            system_messages: system.len(),
            history_total: history.len(),
            duplicates_dropped,
            truncated: before_truncate - window.len(),
        };

        tracing::debug!(
            system = metadata.system_messages,
            history = metadata.history_total,
            duplicates = metadata.duplicates_dropped,
            truncated = metadata.truncated,
            "Context assembled"
        );

        let mut messages = Vec::with_capacity(system.len() + window.len());
        messages.extend_from_slice(system);
        messages.extend(window);

        AssembledContext { messages, metadata }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(20)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
