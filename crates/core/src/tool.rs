//! Tool trait and the executor seam used by the agent loop.
//!
//! The loop only sees [`ToolExecutor`]: `execute(name, arguments) -> {ok, content}`.
//! It may be backed by built-in handlers, MCP-hosted tools, or an external
//! subprocess. [`ToolRegistry`] is the in-process implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ToolError;

/// A tool description presented to the model in the tool catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The result of running a tool, as seen by the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub ok: bool,
    pub content: String,
}

impl ToolOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            ok: true,
            content: content.into(),
        }
    }

    /// A failed outcome. The content always carries the `Error:` marker so
    /// the textual status rule agrees with `ok`.
    pub fn failure(content: impl Into<String>) -> Self {
        let content = content.into();
        let content = if content.starts_with("Error:") || content.starts_with("Unknown error") {
            content
        } else {
            format!("Error: {content}")
        };
        Self { ok: false, content }
    }
}

impl From<ToolError> for ToolOutcome {
    fn from(err: ToolError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Opaque tool execution seam consumed by the agent loop.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions of every tool this executor can run.
    fn catalog(&self) -> Vec<ToolDefinition>;

    /// Run a tool. Failures are reported in the outcome, never raised.
    async fn execute(&self, name: &str, arguments: serde_json::Value) -> ToolOutcome;
}

/// A single in-process tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolOutcome, ToolError>;

    /// Convert this tool into a ToolDefinition for the catalog.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of in-process tools.
///
/// Ordered by name so the catalog sent to the model is deterministic.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn catalog(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    async fn execute(&self, name: &str, arguments: serde_json::Value) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            return ToolError::NotFound(name.to_string()).into();
        };
        match tool.execute(arguments).await {
            Ok(outcome) if outcome.ok => outcome,
            Ok(outcome) => ToolOutcome::failure(outcome.content),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool execution failed");
                e.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolOutcome, ToolError> {
            match arguments["text"].as_str() {
                Some("") => Ok(ToolOutcome {
                    ok: false,
                    content: "nothing to echo".into(),
                }),
                Some(text) => Ok(ToolOutcome::success(text)),
                None => Err(ToolError::InvalidArguments("missing 'text'".into())),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn registry_catalog() {
        let defs = registry().catalog();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn execute_success() {
        let outcome = registry()
            .execute("echo", serde_json::json!({"text": "hello world"}))
            .await;
        assert_eq!(outcome, ToolOutcome::success("hello world"));
    }

    #[tokio::test]
    async fn missing_tool_becomes_error_outcome() {
        let outcome = ToolRegistry::new()
            .execute("nonexistent", serde_json::json!({}))
            .await;
        assert!(!outcome.ok);
        assert_eq!(outcome.content, "Error: Tool not found: nonexistent");
    }

    #[tokio::test]
    async fn tool_error_becomes_error_outcome() {
        let outcome = registry().execute("echo", serde_json::json!({})).await;
        assert!(!outcome.ok);
        assert!(outcome.content.starts_with("Error: Invalid tool arguments"));
    }

    #[tokio::test]
    async fn unsuccessful_output_is_marked() {
        let outcome = registry()
            .execute("echo", serde_json::json!({"text": ""}))
            .await;
        assert_eq!(outcome.content, "Error: nothing to echo");
    }

    #[test]
    fn failure_keeps_existing_marker() {
        assert_eq!(ToolOutcome::failure("Error: x").content, "Error: x");
        assert_eq!(
            ToolOutcome::failure("Unknown error").content,
            "Unknown error"
        );
    }
}
