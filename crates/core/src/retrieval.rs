//! Retrieval collaborator — the RAG and grading subsystem seen from the loop.
//!
//! The loop neither inspects nor limits what comes back; the string is
//! prepended as a system message like any other system context.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait RetrievalCollaborator: Send + Sync {
    /// Retrieve quality-filtered context for a user message.
    ///
    /// `Ok(None)` means nothing relevant was found.
    async fn retrieve(&self, query: &str) -> Result<Option<String>>;
}
