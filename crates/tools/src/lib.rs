//! Built-in tools for the stepwise CLI.
//!
//! The agent loop treats tools as opaque; these exist so a fresh install
//! has something to call.

pub mod calculator;
pub mod clock;

use stepwise_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use clock::CurrentTimeTool;

/// Create a registry with every built-in tool.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CalculatorTool));
    registry.register(Box::new(CurrentTimeTool));
    registry
}
