//! Context assembly pipeline.
//!
//! Builds the message list for each model call from fresh system context and
//! a deduplicated, window-bounded slice of conversation history.

pub mod assembler;

pub use assembler::{
    AssembledContext, AssemblyMetadata, ContextAssembler, SystemContext, deduplicate, truncate,
};
