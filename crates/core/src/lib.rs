//! # tabletalk Core
//!
//! Domain types, traits, and error definitions for the tabletalk
//! conversational data agent. This crate has **zero framework dependencies**
//! — it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability (warehouse metadata, query execution, the
//! language model) is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod grounding;
pub mod model;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use grounding::{GroundingEntry, MetadataSource, QueryEngine, QueryRows, TableId};
pub use model::{
    GenerationConfig, ModelClient, ModelOutcome, ModelRequest, PromptMessage, ToolDefinition,
    ToolInvocation,
};
pub use tool::{Tool, ToolOutput, ToolRegistry};
pub use turn::{CallStatus, LockState, Role, Session, SessionId, ToolCallRecord, Turn};
