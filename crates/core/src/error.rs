//! Error types for the tabletalk domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The taxonomy is flat:
//! every failure the agent core can produce is one of these variants, and
//! each variant is classified as either fatal (surfaced to the caller) or
//! recoverable (absorbed into the reasoning loop as model-visible context).

use thiserror::Error;

/// The top-level error type for all tabletalk operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The session id is unknown to the store (absent or externally expired).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A reasoning loop is already in flight for this session.
    #[error("Session busy: {0} already has a request in progress")]
    SessionBusy(String),

    /// The requested tool name is not in the closed registry.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments failed validation against the declared schema.
    #[error("Invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Tool execution failed after exhausting the retry policy.
    #[error("Tool {tool} failed: {reason}")]
    ToolExecution {
        tool: String,
        reason: String,
        retryable: bool,
    },

    /// DDL could not be fetched for a table. Fatal for that table.
    #[error("Metadata unavailable for table {table}: {reason}")]
    MetadataUnavailable { table: String, reason: String },

    /// The non-evictable prompt sections alone exceed the budget.
    #[error(
        "Prompt budget exceeded: fixed sections need {required} tokens, budget is {budget}"
    )]
    PromptBudgetExceeded { required: usize, budget: usize },

    /// The language model call failed.
    #[error("Model error: {message}")]
    Model { message: String, retryable: bool },

    /// SQL execution failed at the warehouse.
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// The reasoning loop hit its step bound before producing an answer.
    #[error("Reasoning loop exceeded the {limit}-step bound")]
    LoopStepLimitExceeded { limit: u32 },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the reasoning loop may absorb this error and let the model
    /// adapt its plan, rather than terminating the turn.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ToolExecution { retryable, .. } => *retryable,
            Self::Model { retryable, .. } => *retryable,
            Self::QueryExecution(_) => true,
            Self::InvalidArguments { .. } | Self::UnknownTool(_) => true,
            _ => false,
        }
    }

    /// Whether this error must be surfaced to the caller as-is, with no
    /// further session mutation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::SessionBusy(_)
                | Self::MetadataUnavailable { .. }
                | Self::PromptBudgetExceeded { .. }
                | Self::LoopStepLimitExceeded { .. }
        )
    }

    /// A plain-language description safe to show an end user. Internal
    /// detail stays in the log; this never echoes raw reasons verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::SessionNotFound(_) => "Session not found".into(),
            Self::SessionBusy(_) => {
                "The agent is still working on your previous message. Please try again in a moment."
                    .into()
            }
            Self::UnknownTool(_) | Self::InvalidArguments { .. } | Self::ToolExecution { .. } => {
                "I ran into a problem while looking up your data. Please try rephrasing your question."
                    .into()
            }
            Self::MetadataUnavailable { table, .. } => format!(
                "I couldn't load the schema for table '{table}', so I can't answer questions about it right now."
            ),
            Self::PromptBudgetExceeded { .. } => {
                "Your question touches more data than I can consider at once. Please narrow it to fewer tables."
                    .into()
            }
            Self::Model { .. } => {
                "The assistant is temporarily unavailable. Please try again.".into()
            }
            Self::QueryExecution(_) => {
                "The query could not be executed. Please try rephrasing your question.".into()
            }
            Self::LoopStepLimitExceeded { .. } => {
                "I wasn't able to complete that request within my limits. Try a simpler question."
                    .into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::ToolExecution {
            tool: "execute_query".into(),
            reason: "quota exceeded".into(),
            retryable: true,
        };
        assert!(err.to_string().contains("execute_query"));
        assert!(err.to_string().contains("quota exceeded"));
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn metadata_unavailable_is_fatal() {
        let err = Error::MetadataUnavailable {
            table: "orders".into(),
            reason: "permission denied".into(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        // User message names the table but not the internal reason
        assert!(err.user_message().contains("orders"));
        assert!(!err.user_message().contains("permission denied"));
    }

    #[test]
    fn budget_exceeded_displays_numbers() {
        let err = Error::PromptBudgetExceeded {
            required: 9000,
            budget: 4096,
        };
        assert!(err.to_string().contains("9000"));
        assert!(err.to_string().contains("4096"));
        assert!(err.is_fatal());
    }

    #[test]
    fn user_messages_hide_internal_detail() {
        let err = Error::QueryExecution("relation \"prodcts\" does not exist".into());
        assert!(!err.user_message().contains("prodcts"));
    }
}
