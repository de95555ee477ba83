//! The tool dispatcher — validation, timeout, and retry around the registry.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use tabletalk_core::error::{Error, Result};
use tabletalk_core::tool::{ToolOutput, ToolRegistry};

/// Timeout and retry policy applied to every dispatched call.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Per-call timeout
    pub timeout: Duration,

    /// Total attempts for transient failures (1 = no retries)
    pub retry_attempts: u32,

    /// Base delay for exponential backoff; doubles each attempt
    pub retry_base_delay: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

/// Dispatches validated tool calls against the closed registry.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    policy: DispatchPolicy,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, policy: DispatchPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Validate and execute one tool call.
    ///
    /// Fails with `UnknownTool` for unregistered names, `InvalidArguments`
    /// for schema violations, and `ToolExecutionError` once transient
    /// failures exhaust the retry budget. Fatal errors pass through
    /// unchanged so the reasoning loop can terminate on them.
    pub async fn dispatch(&self, name: &str, arguments: &serde_json::Value) -> Result<ToolOutput> {
        let tool = self.registry.get(name)?;
        validate_arguments(name, &tool.parameters_schema(), arguments)?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(tool = name, attempt, "Dispatching tool call");

            match tokio::time::timeout(self.policy.timeout, tool.execute(arguments.clone())).await
            {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(e)) if e.is_fatal() => return Err(e),
                Ok(Err(e)) => {
                    if e.is_retryable() && attempt < self.policy.retry_attempts {
                        let delay = self.policy.retry_base_delay * 2u32.pow(attempt - 1);
                        warn!(
                            tool = name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Transient tool failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(wrap_failure(name, e));
                }
                Err(_elapsed) => {
                    warn!(
                        tool = name,
                        timeout_secs = self.policy.timeout.as_secs(),
                        "Tool call timed out"
                    );
                    return Err(Error::ToolExecution {
                        tool: name.into(),
                        reason: format!(
                            "timed out after {}s",
                            self.policy.timeout.as_secs()
                        ),
                        retryable: true,
                    });
                }
            }
        }
    }
}

/// Normalize a terminal tool failure into the ToolExecutionError shape,
/// preserving retryability for the reasoning loop.
fn wrap_failure(tool: &str, error: Error) -> Error {
    match error {
        e @ Error::ToolExecution { .. } => e,
        e @ Error::InvalidArguments { .. } => e,
        e => Error::ToolExecution {
            tool: tool.into(),
            retryable: e.is_retryable(),
            reason: e.to_string(),
        },
    }
}

/// Validate arguments against a declared JSON schema: required properties
/// must be present and declared primitive types must match.
fn validate_arguments(
    tool: &str,
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> Result<()> {
    let invalid = |reason: String| Error::InvalidArguments {
        tool: tool.into(),
        reason,
    };

    let args = arguments
        .as_object()
        .ok_or_else(|| invalid("Arguments must be a JSON object".into()))?;

    if let Some(required) = schema["required"].as_array() {
        for key in required.iter().filter_map(|v| v.as_str()) {
            if !args.contains_key(key) {
                return Err(invalid(format!("Missing required argument '{key}'")));
            }
        }
    }

    if let Some(properties) = schema["properties"].as_object() {
        for (key, value) in args {
            let Some(declared) = properties.get(key) else {
                continue;
            };
            let Some(expected) = declared["type"].as_str() else {
                continue;
            };
            let ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !ok {
                return Err(invalid(format!(
                    "Argument '{key}' must be of type {expected}"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tabletalk_core::tool::Tool;

    /// Fails with a retryable error until `fail_times` calls have happened.
    struct FlakyTool {
        calls: AtomicU32,
        fail_times: u32,
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "Fails transiently"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "sql": { "type": "string" } },
                "required": ["sql"]
            })
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(Error::ToolExecution {
                    tool: "flaky".into(),
                    reason: "quota exceeded".into(),
                    retryable: true,
                })
            } else {
                Ok(ToolOutput::text("done"))
            }
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Never finishes in time"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    struct FatalTool;

    #[async_trait]
    impl Tool for FatalTool {
        fn name(&self) -> &str {
            "fatal"
        }
        fn description(&self) -> &str {
            "Fails fatally"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput> {
            Err(Error::MetadataUnavailable {
                table: "orders".into(),
                reason: "ddl fetch failed".into(),
            })
        }
    }

    fn dispatcher_with(tool: Arc<dyn Tool>, policy: DispatchPolicy) -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(ToolRegistry::new(vec![tool])), policy)
    }

    fn fast_policy() -> DispatchPolicy {
        DispatchPolicy {
            timeout: Duration::from_millis(100),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn unknown_tool_rejected() {
        let dispatcher = dispatcher_with(Arc::new(FatalTool), fast_policy());
        let err = dispatcher
            .dispatch("nonexistent", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));
    }

    #[tokio::test]
    async fn missing_required_argument_rejected() {
        let dispatcher = dispatcher_with(
            Arc::new(FlakyTool {
                calls: AtomicU32::new(0),
                fail_times: 0,
            }),
            fast_policy(),
        );
        let err = dispatcher
            .dispatch("flaky", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn wrong_type_rejected() {
        let dispatcher = dispatcher_with(
            Arc::new(FlakyTool {
                calls: AtomicU32::new(0),
                fail_times: 0,
            }),
            fast_policy(),
        );
        let err = dispatcher
            .dispatch("flaky", &serde_json::json!({"sql": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn transient_failures_retried_until_success() {
        let tool = Arc::new(FlakyTool {
            calls: AtomicU32::new(0),
            fail_times: 2,
        });
        let dispatcher = dispatcher_with(tool.clone(), fast_policy());

        let out = dispatcher
            .dispatch("flaky", &serde_json::json!({"sql": "SELECT 1"}))
            .await
            .unwrap();
        assert_eq!(out.content, "done");
        assert_eq!(tool.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_cap_enforced() {
        let tool = Arc::new(FlakyTool {
            calls: AtomicU32::new(0),
            fail_times: 10,
        });
        let dispatcher = dispatcher_with(tool.clone(), fast_policy());

        let err = dispatcher
            .dispatch("flaky", &serde_json::json!({"sql": "SELECT 1"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ToolExecution {
                retryable: true,
                ..
            }
        ));
        assert_eq!(tool.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_aborts_call() {
        let dispatcher = dispatcher_with(Arc::new(SlowTool), fast_policy());
        let err = dispatcher
            .dispatch("slow", &serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            Error::ToolExecution { retryable, reason, .. } => {
                assert!(retryable);
                assert!(reason.contains("timed out"));
            }
            other => panic!("Expected ToolExecution, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fatal_error_passes_through() {
        let dispatcher = dispatcher_with(Arc::new(FatalTool), fast_policy());
        let err = dispatcher
            .dispatch("fatal", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MetadataUnavailable { .. }));
    }
}
