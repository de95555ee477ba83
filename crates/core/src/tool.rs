//! Tool trait and the closed registry.
//!
//! Tools are the agent's capabilities against the warehouse: fetch DDL,
//! fetch profiles, fetch samples, execute SQL. The registry is closed —
//! every tool is enumerated at construction and nothing is discovered at
//! runtime. Validation, timeouts, and retries live in the dispatcher, not
//! here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::ToolDefinition;

/// The output of a successful tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text representation fed back to the model
    pub content: String,

    /// Optional structured data recorded on the ToolCallRecord
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The core Tool trait.
///
/// Each capability (fetch_schema, fetch_profiles, fetch_samples,
/// execute_query) implements this trait and is registered in the
/// ToolRegistry at construction.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "execute_query").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput>;

    /// Convert this tool into a ToolDefinition for the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}

/// A closed registry of tools, fixed at construction.
///
/// Ordered by name so tool definitions are presented to the model
/// deterministically.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Build a registry from the full tool set. Later entries with a
    /// duplicate name replace earlier ones.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut map = BTreeMap::new();
        for tool in tools {
            map.insert(tool.name().to_string(), tool);
        }
        Self { tools: map }
    }

    /// Look up a tool, failing with UnknownTool for unregistered names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTool(name.to_string()))
    }

    /// All tool definitions, in name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// All registered tool names, in name order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolOutput::text(text))
        }
    }

    fn echo_registry() -> ToolRegistry {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(EchoTool)];
        ToolRegistry::new(tools)
    }

    #[test]
    fn registry_lookup() {
        let registry = echo_registry();
        assert!(registry.get("echo").is_ok());
        let err = registry.get("nonexistent").unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));
    }

    #[test]
    fn registry_definitions_sorted() {
        let registry = echo_registry();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn tool_executes() {
        let registry = echo_registry();
        let tool = registry.get("echo").unwrap();
        let out = tool
            .execute(serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(out.content, "hello");
    }
}
