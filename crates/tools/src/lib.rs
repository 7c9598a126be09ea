//! Built-in tool implementations for colloquy.
//!
//! The catalog is deliberately small; anything implementing
//! `colloquy_core::Tool` can be registered next to these.

pub mod is_greater;

use colloquy_core::tool::ToolRegistry;

pub use is_greater::IsGreaterTool;

/// Create a default tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(IsGreaterTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::tool::{ToolCall, ToolProvider};

    #[tokio::test]
    async fn default_registry_offers_is_greater() {
        let registry = default_registry();
        let catalog = registry.list_tools().await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "is_greater");

        let call = ToolCall {
            id: "call_1".into(),
            name: "is_greater".into(),
            arguments: serde_json::json!({"a": 3, "b": 2}),
        };
        let result = registry.invoke(&call).await.unwrap();
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.output, "true");
    }
}
