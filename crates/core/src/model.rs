//! ModelClient trait — the abstraction over the language model.
//!
//! The model is an external collaborator: it accepts an assembled prompt
//! plus the available tool schemas and returns exactly one of a final
//! answer, a clarifying question, or one-or-more tool invocations. How the
//! model decides between them is opaque; the reasoning loop only branches
//! on the returned `ModelOutcome`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::turn::Role;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON value (validated by the dispatcher, not here)
    pub arguments: serde_json::Value,
}

/// One message in the wire-level prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// Sampling configuration passed through to the model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            max_output_tokens: 4096,
        }
    }
}

/// A complete request to the model: assembled prompt + available tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// System instructions plus serialized grounding context
    pub system: String,

    /// Bounded history window plus the current utterance
    pub messages: Vec<PromptMessage>,

    /// Tools the model may invoke this step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Sampling parameters
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// What the model decided to do with the prompt. Exactly one of three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelOutcome {
    /// A final textual answer for the user
    FinalAnswer(String),

    /// A follow-up question; the loop suspends until the user replies
    ClarifyingQuestion(String),

    /// One or more tool invocations to execute before continuing
    ToolCalls(Vec<ToolInvocation>),
}

/// The core ModelClient trait.
///
/// The reasoning loop calls `complete()` without knowing which backend is
/// configured. Implementations map their wire format into the tri-state
/// `ModelOutcome`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (for logs).
    fn name(&self) -> &str;

    /// Send a request and get the model's decision.
    async fn complete(&self, request: ModelRequest) -> Result<ModelOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_defaults() {
        let gen = GenerationConfig::default();
        assert!((gen.temperature - 0.1).abs() < f32::EPSILON);
        assert!((gen.top_p - 0.95).abs() < f32::EPSILON);
        assert_eq!(gen.max_output_tokens, 4096);
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "execute_query".into(),
            description: "Run a read-only SQL query".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": { "type": "string", "description": "The SELECT statement to run" }
                },
                "required": ["sql"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("execute_query"));
        assert!(json.contains("sql"));
    }

    #[test]
    fn outcome_roundtrip() {
        let outcome = ModelOutcome::ToolCalls(vec![ToolInvocation {
            name: "fetch_schema".into(),
            arguments: serde_json::json!({"table_ids": ["products"]}),
        }]);
        let json = serde_json::to_string(&outcome).unwrap();
        let back: ModelOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
