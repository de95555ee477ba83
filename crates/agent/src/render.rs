//! Response rendering — the final turn becomes displayable messages.
//!
//! Markdown-bearing content passes through byte-for-byte. Tool arguments
//! and raw grounding payloads never appear in the rendered output; only a
//! turn's text content is exposed.

use serde::{Deserialize, Serialize};

use tabletalk_core::turn::{Role, Turn};

/// One displayable message: `{role, content}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub role: String,
    pub content: String,
}

/// Render a final turn into the ordered message list returned to the
/// caller. An empty-content turn renders to an empty list.
pub fn render(turn: &Turn) -> Vec<RenderedMessage> {
    if turn.content.is_empty() {
        return Vec::new();
    }

    let role = match turn.role {
        Role::User => "user",
        Role::Agent => "model",
        Role::System => "system",
    };

    vec![RenderedMessage {
        role: role.into(),
        content: turn.content.clone(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletalk_core::turn::ToolCallRecord;

    #[test]
    fn agent_turn_renders_as_model() {
        let messages = render(&Turn::agent("Here are the results."));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "model");
        assert_eq!(messages[0].content, "Here are the results.");
    }

    #[test]
    fn markdown_preserved_unmodified() {
        let markdown = "**Top products**\n\n| product | revenue |\n|---|---|\n| Widget | 1200 |";
        let messages = render(&Turn::agent(markdown));
        assert_eq!(messages[0].content, markdown);
    }

    #[test]
    fn tool_arguments_never_leak() {
        let turn = Turn::agent("Done.").with_tool_calls(vec![ToolCallRecord::succeeded(
            "execute_query",
            serde_json::json!({"sql": "SELECT secret FROM internal"}),
            serde_json::json!({"rows": 3}),
        )]);
        let messages = render(&turn);
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].content.contains("SELECT secret"));
    }

    #[test]
    fn empty_turn_renders_nothing() {
        assert!(render(&Turn::agent("")).is_empty());
    }
}
