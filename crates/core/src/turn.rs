//! Session, Turn, and ToolCallRecord domain types.
//!
//! These are the value objects that flow through the system: a user message
//! becomes a Turn, the reasoning loop appends agent and system Turns (with
//! any tool calls they triggered), and the session accumulates them as an
//! append-only history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn in a session's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The data agent
    Agent,
    /// Internal context: tool results, failure notices
    System,
}

/// Execution status of a recorded tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Pending,
    Succeeded,
    Failed,
}

/// A completed (or failed) tool call, as recorded on a Turn.
///
/// Records are created only after the dispatcher returns — a call that is
/// still in flight is never written into history, so cancellation leaves
/// the session consistent at the last fully-appended Turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the invoked tool
    pub name: String,

    /// Arguments as validated against the tool's schema
    pub arguments: serde_json::Value,

    /// The structured result, if the call produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Final status of the call
    pub status: CallStatus,
}

impl ToolCallRecord {
    pub fn succeeded(
        name: impl Into<String>,
        arguments: serde_json::Value,
        result: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: Some(result),
            status: CallStatus::Succeeded,
        }
    }

    pub fn failed(name: impl Into<String>, arguments: serde_json::Value, error: &str) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: Some(serde_json::json!({ "error": error })),
            status: CallStatus::Failed,
        }
    }
}

/// One message in a session's history, plus any tool calls it triggered.
/// Never modified after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls executed as part of this turn (empty for plain messages)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,

    /// Timestamp
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a new agent turn.
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a new system turn (tool results, failure notices).
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach tool call records to this turn.
    pub fn with_tool_calls(mut self, calls: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = calls;
        self
    }
}

/// Whether a session currently has a reasoning loop in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    #[default]
    Free,
    InProgress,
}

/// A conversation session: append-only history plus clarification state.
///
/// Exactly one reasoning loop may run per session at a time; the store's
/// `try_acquire`/`release` pair enforces that via `lock_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,

    /// The owning user
    pub user_id: String,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// Ordered turns, append-only
    pub history: Vec<Turn>,

    /// A clarifying question awaiting the user's reply, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_clarification: Option<String>,

    /// Exclusive-access state
    #[serde(default)]
    pub lock_state: LockState,
}

impl Session {
    /// Create a new empty session for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            user_id: user_id.into(),
            created_at: Utc::now(),
            history: Vec::new(),
            pending_clarification: None,
            lock_state: LockState::Free,
        }
    }

    /// Append a turn. History is never reordered or mutated after this.
    pub fn append(&mut self, turn: Turn) {
        self.history.push(turn);
    }

    /// The most recent turn, if any.
    pub fn last_turn(&self) -> Option<&Turn> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("List top products");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "List top products");
        assert!(turn.tool_calls.is_empty());
    }

    #[test]
    fn turn_with_tool_calls() {
        let record = ToolCallRecord::succeeded(
            "fetch_schema",
            serde_json::json!({"table_ids": ["orders"]}),
            serde_json::json!({"ddl": "CREATE TABLE orders (...)"}),
        );
        let turn = Turn::system("schema fetched").with_tool_calls(vec![record]);
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].status, CallStatus::Succeeded);
    }

    #[test]
    fn failed_record_carries_error() {
        let record = ToolCallRecord::failed(
            "execute_query",
            serde_json::json!({"sql": "SELECT 1"}),
            "quota exceeded",
        );
        assert_eq!(record.status, CallStatus::Failed);
        assert!(record.result.unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("quota"));
    }

    #[test]
    fn session_history_preserves_append_order() {
        let mut session = Session::new("user_1");
        for i in 0..5 {
            session.append(Turn::user(format!("question {i}")));
        }
        let contents: Vec<&str> = session.history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["question 0", "question 1", "question 2", "question 3", "question 4"]
        );
    }

    #[test]
    fn session_starts_free_and_unclarified() {
        let session = Session::new("user_1");
        assert_eq!(session.lock_state, LockState::Free);
        assert!(session.pending_clarification.is_none());
        assert!(session.last_turn().is_none());
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::agent("Here are your results");
        let json = serde_json::to_string(&turn).unwrap();
        let deserialized: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "Here are your results");
        assert_eq!(deserialized.role, Role::Agent);
    }
}
