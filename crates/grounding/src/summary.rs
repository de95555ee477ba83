//! Dataset-level summaries served by the gateway's tables endpoints.

use serde::{Deserialize, Serialize};

use tabletalk_core::error::Result;
use tabletalk_core::grounding::{MetadataSource, TableId};

use crate::provider::GroundingProvider;

/// Headline statistics for the configured dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub tables: Vec<String>,
    pub num_tables: usize,
    pub total_columns: u64,
    pub total_rows: u64,
}

/// A bounded preview of one table: sample rows plus its description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePreview {
    pub data: serde_json::Value,
    pub description: String,
}

impl GroundingProvider {
    /// Summarize the dataset: table names, table/column counts, and the sum
    /// of per-table row counts.
    pub async fn dataset_summary(&self) -> Result<DatasetSummary> {
        let source = self.source();
        let table_ids = source.list_tables().await?;

        let mut total_rows = 0u64;
        for table in &table_ids {
            total_rows += source.table_row_count(table).await.unwrap_or(0);
        }

        let total_columns = source.total_column_count().await.unwrap_or(0);

        Ok(DatasetSummary {
            num_tables: table_ids.len(),
            tables: table_ids.into_iter().map(|t| t.0).collect(),
            total_columns,
            total_rows,
        })
    }

    /// A sample-rows-plus-description preview for one table.
    pub async fn table_preview(&self, table: &TableId, row_limit: usize) -> Result<TablePreview> {
        let source = self.source();
        let mut samples = source
            .fetch_samples(std::slice::from_ref(table), row_limit)
            .await?;
        let data = samples
            .remove(table)
            .unwrap_or(serde_json::Value::Array(vec![]));
        let description = source.table_description(table).await.unwrap_or_default();

        Ok(TablePreview { data, description })
    }
}
