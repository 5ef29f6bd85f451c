//! ConversationStore trait — persistence of conversation records.
//!
//! The agent loop calls `save` once per turn; it never implements
//! persistence itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{Conversation, ConversationId};

/// Lightweight listing entry for a stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(conv: &Conversation) -> Self {
        Self {
            id: conv.id.clone(),
            title: conv.title.clone(),
            message_count: conv.messages.len(),
            updated_at: conv.updated_at,
        }
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// A human-readable name for this backend (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Persist the full conversation, replacing any previous record.
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// Load a conversation by ID. `Ok(None)` if it was never saved.
    async fn load(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError>;

    /// List stored conversations, most recently updated first.
    async fn list(&self) -> Result<Vec<ConversationSummary>, StoreError>;
}
