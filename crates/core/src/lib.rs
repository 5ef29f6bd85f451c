//! # Stepwise Core
//!
//! Domain types, collaborator traits, and error definitions for the stepwise
//! agent loop. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the loop (model provider, tool executor,
//! conversation store, retrieval subsystem) is a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod step;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentConfig;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use retrieval::RetrievalCollaborator;
pub use step::{ExecutionStep, StepKind, StepStatus};
pub use store::ConversationStore;
pub use tool::{Tool, ToolExecutor, ToolOutcome, ToolRegistry};
