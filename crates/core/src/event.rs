//! Domain event system — decoupled observation of agent turns.
//!
//! Events are published when something interesting happens in a turn.
//! Other components can subscribe to react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user turn began
    TurnStarted {
        conversation_id: String,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// A model call finished streaming
    ResponseGenerated {
        conversation_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A turn reached its final answer
    TurnCompleted {
        conversation_id: String,
        model_calls: usize,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A turn used all of its model calls without a final answer
    TurnStepLimited {
        conversation_id: String,
        max_turns: u32,
        model_calls: usize,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A turn was stopped by the user
    TurnCancelled {
        conversation_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn aborted on a transport error
    TurnFailed {
        conversation_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
