//! The execute_query tool — read-only SQL against the warehouse.
//!
//! Results come back to the model as a Markdown pipe table; an empty result
//! set returns an explicit sentence so the model is not confused by
//! emptiness.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use tabletalk_core::error::{Error, Result};
use tabletalk_core::grounding::{QueryEngine, QueryRows};
use tabletalk_core::tool::{Tool, ToolOutput};

const EMPTY_RESULT_MESSAGE: &str =
    "The query executed successfully but returned no matching data.";

/// Executes a read-only SELECT query and formats the result for the model.
pub struct ExecuteQueryTool {
    engine: Arc<dyn QueryEngine>,
}

impl ExecuteQueryTool {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }
}

/// Whether the statement is a plain read. Leading whitespace and line
/// comments are skipped before the keyword check.
fn is_read_only(sql: &str) -> bool {
    let body: String = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    let upper = body.trim_start().to_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH")
}

/// Render rows as a Markdown pipe table.
fn to_markdown(rows: &QueryRows) -> String {
    let mut out = String::new();
    out.push_str("| ");
    out.push_str(&rows.columns.join(" | "));
    out.push_str(" |\n|");
    for _ in &rows.columns {
        out.push_str("---|");
    }
    out.push('\n');

    for row in &rows.rows {
        out.push_str("| ");
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
    }

    out
}

#[async_trait]
impl Tool for ExecuteQueryTool {
    fn name(&self) -> &str {
        "execute_query"
    }

    fn description(&self) -> &str {
        "Execute a read-only (SELECT) SQL query and return the result as a Markdown table. The statement must be valid and complete."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL query string to execute"
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
        let sql = arguments["sql"]
            .as_str()
            .ok_or_else(|| Error::InvalidArguments {
                tool: self.name().into(),
                reason: "Missing 'sql' argument".into(),
            })?;

        if !is_read_only(sql) {
            return Err(Error::InvalidArguments {
                tool: self.name().into(),
                reason: "Only SELECT statements are allowed".into(),
            });
        }

        info!(sql = %sql, "Executing query");
        let start = Instant::now();
        let result = self.engine.execute(sql).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(rows) if rows.is_empty() => {
                info!(duration_ms, "Query returned no rows");
                Ok(ToolOutput::text(EMPTY_RESULT_MESSAGE))
            }
            Ok(rows) => {
                info!(duration_ms, row_count = rows.rows.len(), "Query succeeded");
                let data = serde_json::to_value(&rows).ok();
                let mut out = ToolOutput::text(to_markdown(&rows));
                out.data = data;
                Ok(out)
            }
            Err(e) => {
                warn!(duration_ms, error = %e, "Query failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine {
        rows: QueryRows,
    }

    #[async_trait]
    impl QueryEngine for FixedEngine {
        async fn execute(&self, _sql: &str) -> Result<QueryRows> {
            Ok(self.rows.clone())
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl QueryEngine for FailingEngine {
        async fn execute(&self, _sql: &str) -> Result<QueryRows> {
            Err(Error::QueryExecution("table not found".into()))
        }
    }

    fn result_rows() -> QueryRows {
        QueryRows {
            columns: vec!["product".into(), "revenue".into()],
            rows: vec![
                vec![serde_json::json!("Widget"), serde_json::json!(1200.5)],
                vec![serde_json::json!("Gadget"), serde_json::json!(800)],
            ],
        }
    }

    #[tokio::test]
    async fn renders_markdown_table() {
        let tool = ExecuteQueryTool::new(Arc::new(FixedEngine { rows: result_rows() }));
        let out = tool
            .execute(serde_json::json!({"sql": "SELECT product, revenue FROM sales"}))
            .await
            .unwrap();
        assert!(out.content.contains("| product | revenue |"));
        assert!(out.content.contains("| Widget | 1200.5 |"));
        assert!(out.data.is_some());
    }

    #[tokio::test]
    async fn empty_result_returns_sentinel() {
        let tool = ExecuteQueryTool::new(Arc::new(FixedEngine {
            rows: QueryRows {
                columns: vec!["id".into()],
                rows: vec![],
            },
        }));
        let out = tool
            .execute(serde_json::json!({"sql": "SELECT id FROM empty"}))
            .await
            .unwrap();
        assert_eq!(out.content, EMPTY_RESULT_MESSAGE);
    }

    #[tokio::test]
    async fn non_select_rejected() {
        let tool = ExecuteQueryTool::new(Arc::new(FixedEngine { rows: result_rows() }));
        let err = tool
            .execute(serde_json::json!({"sql": "DROP TABLE sales"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn cte_allowed() {
        let tool = ExecuteQueryTool::new(Arc::new(FixedEngine { rows: result_rows() }));
        let out = tool
            .execute(serde_json::json!({"sql": "WITH t AS (SELECT 1 AS x) SELECT x FROM t"}))
            .await;
        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn leading_comment_skipped() {
        assert!(is_read_only("-- revenue report\nSELECT 1"));
        assert!(!is_read_only("-- cleanup\nDELETE FROM t"));
    }

    #[tokio::test]
    async fn engine_error_propagates() {
        let tool = ExecuteQueryTool::new(Arc::new(FailingEngine));
        let err = tool
            .execute(serde_json::json!({"sql": "SELECT 1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueryExecution(_)));
    }
}
