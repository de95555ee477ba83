//! HTTP model client for chat-completions style endpoints.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing a
//! compatible `/chat/completions` route with function calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tabletalk_core::error::{Error, Result};
use tabletalk_core::model::{
    ModelClient, ModelOutcome, ModelRequest, PromptMessage, ToolDefinition, ToolInvocation,
};
use tabletalk_core::turn::Role;

use crate::outcome::classify_text;

/// A chat-completions HTTP model client.
pub struct HttpModelClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    clarification_marker: String,
    client: reqwest::Client,
}

impl HttpModelClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        clarification_marker: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Model {
                message: format!("Failed to build HTTP client: {e}"),
                retryable: false,
            })?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            clarification_marker: clarification_marker.into(),
            client,
        })
    }

    /// Convert the assembled prompt into API wire messages: system first,
    /// then the history window and current utterance in order.
    fn to_api_messages(system: &str, messages: &[PromptMessage]) -> Vec<ApiMessage> {
        let mut api = Vec::with_capacity(messages.len() + 1);
        api.push(ApiMessage {
            role: "system".into(),
            content: system.to_string(),
        });
        for m in messages {
            api.push(ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Agent => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: m.content.clone(),
            });
        }
        api
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelOutcome> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request.system, &request.messages),
            "temperature": request.generation.temperature,
            "top_p": request.generation.top_p,
            "max_tokens": request.generation.max_output_tokens,
            "stream": false,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(client = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Model {
                message: format!("Network error: {e}"),
                retryable: true,
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(Error::Model {
                message: "Rate limited by model endpoint".into(),
                retryable: true,
            });
        }

        if status == 401 || status == 403 {
            return Err(Error::Model {
                message: "Authentication failed at model endpoint".into(),
                retryable: false,
            });
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model endpoint returned error");
            return Err(Error::Model {
                message: format!("Model endpoint returned status {status}"),
                retryable: status >= 500,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| Error::Model {
            message: format!("Failed to parse model response: {e}"),
            retryable: false,
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model {
                message: "No choices in model response".into(),
                retryable: false,
            })?;

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        if !tool_calls.is_empty() {
            let invocations = tool_calls
                .into_iter()
                .map(|tc| ToolInvocation {
                    name: tc.function.name,
                    arguments: serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(serde_json::Value::Object(Default::default())),
                })
                .collect();
            return Ok(ModelOutcome::ToolCalls(invocations));
        }

        let text = choice.message.content.unwrap_or_default();
        Ok(classify_text(&text, &self.clarification_marker))
    }
}

// ── API wire types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    function: ApiCalledFunction,
}

#[derive(Deserialize)]
struct ApiCalledFunction {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_messages_start_with_system() {
        let messages = vec![
            PromptMessage {
                role: Role::User,
                content: "List products".into(),
            },
            PromptMessage {
                role: Role::Agent,
                content: "Which region?".into(),
            },
        ];
        let api = HttpModelClient::to_api_messages("You are a data agent.", &messages);
        assert_eq!(api.len(), 3);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
    }

    #[test]
    fn tool_call_response_parses() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "function": {
                            "name": "execute_query",
                            "arguments": "{\"sql\": \"SELECT 1\"}"
                        }
                    }]
                }
            }]
        });
        let parsed: ApiResponse = serde_json::from_value(raw).unwrap();
        let calls = parsed.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "execute_query");
    }

    #[test]
    fn malformed_arguments_fall_back_to_empty_object() {
        let value: serde_json::Value = serde_json::from_str("not json")
            .unwrap_or(serde_json::Value::Object(Default::default()));
        assert!(value.as_object().unwrap().is_empty());
    }
}
