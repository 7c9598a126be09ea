//! Tool traits - the catalog of functions the model may call.
//!
//! [`Tool`] is one callable function. [`ToolProvider`] is the capability the
//! orchestrator consumes: list the catalog, invoke by name. [`ToolRegistry`]
//! is the standard in-process provider.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// The value reported back to the model and rendered into the log:
    /// structured data when present, the text output otherwise.
    pub fn value(&self) -> serde_json::Value {
        self.data
            .clone()
            .unwrap_or_else(|| serde_json::Value::String(self.output.clone()))
    }
}

/// A single callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "is_greater").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The tool capability consumed by the orchestrator.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn initialize(&self) -> std::result::Result<(), ToolError> {
        Ok(())
    }

    async fn reset(&self) -> std::result::Result<(), ToolError> {
        Ok(())
    }

    /// The full catalog offered to the model.
    async fn list_tools(&self) -> Vec<ToolDefinition>;

    /// Resolve a call to a result or a failure.
    async fn invoke(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError>;
}

/// A registry of in-process tools, keyed by name.
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

    /// Get all tool definitions, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        if result.call_id.is_empty() {
            result.call_id = call.id.clone();
        }
        Ok(result)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    async fn list_tools(&self) -> Vec<ToolDefinition> {
        self.definitions()
    }

    async fn invoke(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        self.execute(call).await
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
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: text,
                data: None,
            })
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn registry_lists_catalog() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.list_tools().await;
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn registry_invoke_fills_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"text": "hello world"}),
        };
        let result = registry.invoke(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello world");
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.value(), serde_json::json!("hello world"));
    }

    #[tokio::test]
    async fn registry_invoke_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.invoke(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
