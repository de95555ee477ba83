//! Demo warehouse — a small in-process dataset.
//!
//! In production the metadata source and query engine sit in front of a
//! real warehouse client. The demo backend ships two tiny tables so the
//! agent can be exercised end-to-end without credentials. Its query engine
//! does not parse SQL; it returns the rows of the first demo table named in
//! the statement, which is enough for trying out the conversation flow.

use async_trait::async_trait;
use std::collections::HashMap;

use tabletalk_core::error::{Error, Result};
use tabletalk_core::grounding::{MetadataSource, QueryEngine, QueryRows, TableId};

struct DemoTable {
    name: &'static str,
    description: &'static str,
    ddl: &'static str,
    columns: &'static [&'static str],
    rows: Vec<Vec<serde_json::Value>>,
}

/// Two fixed tables: products and orders.
pub struct DemoWarehouse {
    tables: Vec<DemoTable>,
}

impl DemoWarehouse {
    pub fn new() -> Self {
        let products = DemoTable {
            name: "products",
            description: "Products available for sale",
            ddl: "CREATE TABLE products (\n  id INT64,\n  name STRING,\n  category STRING,\n  price FLOAT64\n)",
            columns: &["id", "name", "category", "price"],
            rows: vec![
                vec![1.into(), "Widget".into(), "hardware".into(), 19.99.into()],
                vec![2.into(), "Gadget".into(), "hardware".into(), 34.5.into()],
                vec![3.into(), "Doohickey".into(), "novelty".into(), 5.0.into()],
            ],
        };
        let orders = DemoTable {
            name: "orders",
            description: "Orders placed by customers",
            ddl: "CREATE TABLE orders (\n  id INT64,\n  product_id INT64,\n  status STRING,\n  amount FLOAT64\n)",
            columns: &["id", "product_id", "status", "amount"],
            rows: vec![
                vec![100.into(), 1.into(), "shipped".into(), 19.99.into()],
                vec![101.into(), 2.into(), "pending".into(), 34.5.into()],
                vec![102.into(), 1.into(), "shipped".into(), 39.98.into()],
            ],
        };
        Self {
            tables: vec![products, orders],
        }
    }

    fn find(&self, table: &TableId) -> Option<&DemoTable> {
        self.tables.iter().find(|t| t.name == table.as_str())
    }
}

impl Default for DemoWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataSource for DemoWarehouse {
    fn name(&self) -> &str {
        "demo"
    }

    async fn fetch_ddl(&self, tables: &[TableId]) -> Result<HashMap<TableId, String>> {
        Ok(tables
            .iter()
            .filter_map(|t| self.find(t).map(|d| (t.clone(), d.ddl.to_string())))
            .collect())
    }

    async fn fetch_profiles(
        &self,
        _tables: &[TableId],
    ) -> Result<HashMap<TableId, serde_json::Value>> {
        // The demo dataset has no profiling pipeline; samples stand in.
        Ok(HashMap::new())
    }

    async fn fetch_samples(
        &self,
        tables: &[TableId],
        row_limit: usize,
    ) -> Result<HashMap<TableId, serde_json::Value>> {
        Ok(tables
            .iter()
            .filter_map(|t| {
                self.find(t).map(|d| {
                    let rows: Vec<serde_json::Value> = d
                        .rows
                        .iter()
                        .take(row_limit)
                        .map(|row| {
                            let obj: serde_json::Map<String, serde_json::Value> = d
                                .columns
                                .iter()
                                .zip(row.iter())
                                .map(|(c, v)| (c.to_string(), v.clone()))
                                .collect();
                            serde_json::Value::Object(obj)
                        })
                        .collect();
                    (t.clone(), serde_json::json!(rows))
                })
            })
            .collect())
    }

    async fn list_tables(&self) -> Result<Vec<TableId>> {
        Ok(self.tables.iter().map(|t| TableId::from(t.name)).collect())
    }

    async fn table_description(&self, table: &TableId) -> Result<String> {
        Ok(self
            .find(table)
            .map(|t| t.description.to_string())
            .unwrap_or_default())
    }

    async fn table_row_count(&self, table: &TableId) -> Result<u64> {
        Ok(self.find(table).map(|t| t.rows.len() as u64).unwrap_or(0))
    }

    async fn total_column_count(&self) -> Result<u64> {
        Ok(self.tables.iter().map(|t| t.columns.len() as u64).sum())
    }
}

#[async_trait]
impl QueryEngine for DemoWarehouse {
    async fn execute(&self, sql: &str) -> Result<QueryRows> {
        let lower = sql.to_lowercase();
        let table = self
            .tables
            .iter()
            .find(|t| lower.contains(t.name))
            .ok_or_else(|| {
                Error::QueryExecution("query references no known demo table".into())
            })?;

        Ok(QueryRows {
            columns: table.columns.iter().map(|c| c.to_string()).collect(),
            rows: table.rows.clone(),
        })
    }
}
