//! Grounding types and the warehouse capability traits.
//!
//! Grounding is the schema/profile/sample metadata injected into the prompt
//! so generated SQL only references real tables, columns, and values. The
//! warehouse itself is an external collaborator reached through the
//! `MetadataSource` and `QueryEngine` traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// Identifier for a table within the configured dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub String);

impl TableId {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cached grounding metadata for one table.
///
/// DDL is mandatory. Profile and sample rows are mutually substitutable:
/// when profiles are unavailable, a bounded sample stands in. Both may be
/// absent only when both fetches degraded — DDL-only grounding is the floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingEntry {
    pub table_id: TableId,

    /// CREATE TABLE statement text
    pub ddl: String,

    /// Column statistics (null percentages, min/max, top values)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,

    /// A handful of example rows, used when profiles are unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rows: Option<serde_json::Value>,

    /// When this entry was fetched
    pub fetched_at: DateTime<Utc>,

    /// How long the entry stays usable
    pub ttl: Duration,
}

impl GroundingEntry {
    /// Whether this entry has outlived its TTL and must be refetched.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO);
        age >= self.ttl
    }

    /// Whether the entry carries value-level context (profile or sample).
    pub fn has_value_context(&self) -> bool {
        self.profile.is_some() || self.sample_rows.is_some()
    }
}

/// Tabular result of a SQL query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read access to warehouse metadata: DDL, data profiles, sample rows,
/// and dataset-level counts.
///
/// Per-table failures are reported per table: a table missing from a
/// returned map means its fetch failed upstream; the caller decides whether
/// that is fatal (DDL) or degradable (profiles, samples).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// A human-readable name for this source (for logs).
    fn name(&self) -> &str;

    /// Fetch CREATE TABLE DDL text for the given tables.
    async fn fetch_ddl(&self, tables: &[TableId]) -> Result<HashMap<TableId, String>>;

    /// Fetch column data profiles for the given tables.
    async fn fetch_profiles(
        &self,
        tables: &[TableId],
    ) -> Result<HashMap<TableId, serde_json::Value>>;

    /// Fetch up to `row_limit` sample rows per table.
    async fn fetch_samples(
        &self,
        tables: &[TableId],
        row_limit: usize,
    ) -> Result<HashMap<TableId, serde_json::Value>>;

    /// List all base tables in the dataset.
    async fn list_tables(&self) -> Result<Vec<TableId>>;

    /// The table's human-written description, empty if none.
    async fn table_description(&self, table: &TableId) -> Result<String> {
        let _ = table;
        Ok(String::new())
    }

    /// Total row count for one table.
    async fn table_row_count(&self, table: &TableId) -> Result<u64>;

    /// Total column count across the dataset.
    async fn total_column_count(&self) -> Result<u64>;
}

/// SQL execution against the warehouse. Read-only by contract; the
/// execute_query tool rejects non-SELECT statements before calling this.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryRows>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl: Duration, age: chrono::TimeDelta) -> GroundingEntry {
        GroundingEntry {
            table_id: TableId::from("orders"),
            ddl: "CREATE TABLE orders (id INT64)".into(),
            profile: None,
            sample_rows: None,
            fetched_at: Utc::now() - age,
            ttl,
        }
    }

    #[test]
    fn fresh_entry_not_expired() {
        let e = entry(Duration::from_secs(3600), chrono::TimeDelta::seconds(10));
        assert!(!e.is_expired(Utc::now()));
    }

    #[test]
    fn stale_entry_expired() {
        let e = entry(Duration::from_secs(60), chrono::TimeDelta::seconds(120));
        assert!(e.is_expired(Utc::now()));
    }

    #[test]
    fn value_context_from_profile_or_sample() {
        let mut e = entry(Duration::from_secs(60), chrono::TimeDelta::zero());
        assert!(!e.has_value_context());
        e.profile = Some(serde_json::json!([{"column_name": "status"}]));
        assert!(e.has_value_context());
        e.profile = None;
        e.sample_rows = Some(serde_json::json!([{"id": 1}]));
        assert!(e.has_value_context());
    }

    #[test]
    fn query_rows_empty() {
        let rows = QueryRows {
            columns: vec!["id".into()],
            rows: vec![],
        };
        assert!(rows.is_empty());
    }
}
