//! The stepwise agent loop.
//!
//! The agent follows a **reason → act → observe** cycle for each user turn:
//!
//! 1. **Receive** a user message
//! 2. **Build context** (persona + tool catalog + retrieved context + bounded history)
//! 3. **Stream** the model's reply
//! 4. **If the reply holds a fenced tool call**: run the tool, append
//!    `Tool <name> result: <text>`, loop back to step 2
//! 5. **Otherwise**: the reply is the final answer, carrying the turn's trace
//!
//! Tool calls are a text protocol over plain completions (see [`protocol`]),
//! so any chat model works without native function calling.

pub mod cancel;
pub mod context;
pub mod controller;
pub mod history;
pub mod protocol;
pub mod stream_event;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cancel::{StopHandle, StopSignal, stop_pair};
pub use context::{AssembledContext, AssemblyMetadata, ContextAssembler, SystemContext};
pub use controller::{AgentLoopController, TurnOptions, TurnOutcome};
pub use history::{group_for_display, reconstruct};
pub use protocol::ToolCallRequest;
pub use stream_event::AgentStreamEvent;
pub use trace::{ExecutionTrace, TraceState, TraceUpdate, render_steps};
