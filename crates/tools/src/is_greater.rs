//! Comparison tool - reports whether `a` is greater than `b`.

use async_trait::async_trait;
use colloquy_core::error::ToolError;
use colloquy_core::tool::{Tool, ToolResult};
use tracing::debug;

pub struct IsGreaterTool;

impl IsGreaterTool {
    fn number(arguments: &serde_json::Value, key: &str) -> Result<f64, ToolError> {
        let value = &arguments[key];
        // Models sometimes quote numbers.
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be a number")))
    }
}

#[async_trait]
impl Tool for IsGreaterTool {
    fn name(&self) -> &str {
        "is_greater"
    }

    fn description(&self) -> &str {
        "Compares two values (a > b)"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "a": { "type": "number", "description": "The first value" },
                "b": { "type": "number", "description": "The second value" }
            },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let a = Self::number(&arguments, "a")?;
        let b = Self::number(&arguments, "b")?;
        let greater = a > b;
        debug!(a, b, greater, "Compared values");

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: greater.to_string(),
            data: Some(serde_json::Value::Bool(greater)),
        })
    }
}
