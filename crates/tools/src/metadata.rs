//! Metadata tools — DDL, profiles, and sample rows.
//!
//! All three route through the grounding provider so the model's metadata
//! requests hit the same TTL cache and coalescing guard as prompt assembly.

use async_trait::async_trait;
use std::sync::Arc;

use tabletalk_core::error::{Error, Result};
use tabletalk_core::grounding::{MetadataSource, TableId};
use tabletalk_core::tool::{Tool, ToolOutput};
use tabletalk_grounding::GroundingProvider;

/// Parse the `table_ids` argument common to the metadata tools.
fn parse_table_ids(tool: &str, arguments: &serde_json::Value) -> Result<Vec<TableId>> {
    let ids = arguments["table_ids"]
        .as_array()
        .ok_or_else(|| Error::InvalidArguments {
            tool: tool.into(),
            reason: "Missing 'table_ids' argument".into(),
        })?;

    let tables: Vec<TableId> = ids
        .iter()
        .filter_map(|v| v.as_str())
        .map(TableId::from)
        .collect();

    if tables.is_empty() {
        return Err(Error::InvalidArguments {
            tool: tool.into(),
            reason: "'table_ids' must contain at least one table name".into(),
        });
    }

    Ok(tables)
}

fn table_ids_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "table_ids": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Names of the tables to look up"
            }
        },
        "required": ["table_ids"]
    })
}

/// Fetch CREATE TABLE DDL text for one or more tables.
pub struct FetchSchemaTool {
    grounding: Arc<GroundingProvider>,
}

impl FetchSchemaTool {
    pub fn new(grounding: Arc<GroundingProvider>) -> Self {
        Self { grounding }
    }
}

#[async_trait]
impl Tool for FetchSchemaTool {
    fn name(&self) -> &str {
        "fetch_schema"
    }

    fn description(&self) -> &str {
        "Fetch the CREATE TABLE DDL for the given tables. Use this before writing SQL against a table you have not seen yet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        table_ids_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
        let tables = parse_table_ids(self.name(), &arguments)?;
        let context = self.grounding.get_context(&tables).await?;

        let mut sections = Vec::with_capacity(tables.len());
        for table in &tables {
            if let Some(entry) = context.get(table) {
                sections.push(format!("-- {}\n{}", table, entry.ddl));
            }
        }

        let data = serde_json::json!(context
            .values()
            .map(|e| serde_json::json!({"table": e.table_id.as_str(), "ddl": e.ddl}))
            .collect::<Vec<_>>());

        Ok(ToolOutput::text(sections.join("\n\n")).with_data(data))
    }
}

/// Fetch column data profiles for one or more tables.
pub struct FetchProfilesTool {
    grounding: Arc<GroundingProvider>,
}

impl FetchProfilesTool {
    pub fn new(grounding: Arc<GroundingProvider>) -> Self {
        Self { grounding }
    }
}

#[async_trait]
impl Tool for FetchProfilesTool {
    fn name(&self) -> &str {
        "fetch_profiles"
    }

    fn description(&self) -> &str {
        "Fetch column statistics (null percentages, min/max, top values) for the given tables. Prefer these over guessing filter values."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        table_ids_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
        let tables = parse_table_ids(self.name(), &arguments)?;
        let context = self.grounding.get_context(&tables).await?;

        let mut profiles = serde_json::Map::new();
        for table in &tables {
            if let Some(profile) = context.get(table).and_then(|e| e.profile.clone()) {
                profiles.insert(table.to_string(), profile);
            }
        }

        if profiles.is_empty() {
            return Ok(ToolOutput::text(
                "No data profiles are available for the requested tables. Use fetch_samples instead.",
            ));
        }

        let data = serde_json::Value::Object(profiles);
        let content =
            serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string());
        Ok(ToolOutput::text(content).with_data(data))
    }
}

/// Fetch a bounded number of sample rows per table.
pub struct FetchSamplesTool {
    grounding: Arc<GroundingProvider>,
}

impl FetchSamplesTool {
    pub fn new(grounding: Arc<GroundingProvider>) -> Self {
        Self { grounding }
    }
}

/// Upper bound on sample rows regardless of what the model asks for.
const MAX_SAMPLE_ROWS: usize = 10;

#[async_trait]
impl Tool for FetchSamplesTool {
    fn name(&self) -> &str {
        "fetch_samples"
    }

    fn description(&self) -> &str {
        "Fetch a few example rows from the given tables to see real values and formats."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "table_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Names of the tables to sample"
                },
                "row_limit": {
                    "type": "integer",
                    "description": "Rows per table (default 3, max 10)",
                    "default": 3
                }
            },
            "required": ["table_ids"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
        let tables = parse_table_ids(self.name(), &arguments)?;
        let row_limit = arguments["row_limit"]
            .as_u64()
            .unwrap_or(3)
            .min(MAX_SAMPLE_ROWS as u64) as usize;

        let samples = self
            .grounding
            .source()
            .fetch_samples(&tables, row_limit)
            .await?;

        if samples.is_empty() {
            return Ok(ToolOutput::text(
                "No sample rows could be fetched for the requested tables.",
            ));
        }

        let data = serde_json::json!(samples
            .iter()
            .map(|(t, rows)| serde_json::json!({"table": t.as_str(), "sample_rows": rows}))
            .collect::<Vec<_>>());
        let content =
            serde_json::to_string_pretty(&data).unwrap_or_else(|_| "[]".to_string());
        Ok(ToolOutput::text(content).with_data(data))
    }
}
