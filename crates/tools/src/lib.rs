//! Built-in tools and the dispatcher.
//!
//! Four tools cover everything the agent can do against the warehouse:
//! fetch DDL, fetch profiles, fetch samples, execute SQL. The dispatcher
//! wraps the closed registry with schema validation, a per-call timeout,
//! and exponential-backoff retries for transient failures.

pub mod dispatcher;
pub mod metadata;
pub mod query;

pub use dispatcher::{DispatchPolicy, ToolDispatcher};
pub use metadata::{FetchProfilesTool, FetchSamplesTool, FetchSchemaTool};
pub use query::ExecuteQueryTool;

use std::sync::Arc;
use tabletalk_core::grounding::QueryEngine;
use tabletalk_core::tool::{Tool, ToolRegistry};
use tabletalk_grounding::GroundingProvider;

/// Build the full tool registry for a grounding provider and query engine.
pub fn default_registry(
    grounding: Arc<GroundingProvider>,
    engine: Arc<dyn QueryEngine>,
) -> ToolRegistry {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(FetchSchemaTool::new(grounding.clone())),
        Arc::new(FetchProfilesTool::new(grounding.clone())),
        Arc::new(FetchSamplesTool::new(grounding)),
        Arc::new(ExecuteQueryTool::new(engine)),
    ];
    ToolRegistry::new(tools)
}
