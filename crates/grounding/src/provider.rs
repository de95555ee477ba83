//! The grounding provider implementation.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use tabletalk_core::error::{Error, Result};
use tabletalk_core::grounding::{GroundingEntry, MetadataSource, TableId};

/// Column profiles with more than this percentage of nulls are dropped
/// before caching — they add prompt noise without constraining SQL.
const MAX_NULL_PERCENT: f64 = 90.0;

/// Fetches and caches grounding metadata per table.
///
/// Concurrent `get_context` calls for the same table collapse into a single
/// upstream fetch: each table has an async guard, and whoever holds it
/// re-checks the cache before fetching.
pub struct GroundingProvider {
    source: Arc<dyn MetadataSource>,
    ttl: Duration,
    sample_row_limit: usize,
    cache: RwLock<HashMap<TableId, GroundingEntry>>,
    fetch_guards: Mutex<HashMap<TableId, Arc<Mutex<()>>>>,
}

impl GroundingProvider {
    pub fn new(source: Arc<dyn MetadataSource>, ttl: Duration, sample_row_limit: usize) -> Self {
        Self {
            source,
            ttl,
            sample_row_limit,
            cache: RwLock::new(HashMap::new()),
            fetch_guards: Mutex::new(HashMap::new()),
        }
    }

    /// The metadata source backing this provider.
    pub fn source(&self) -> &Arc<dyn MetadataSource> {
        &self.source
    }

    /// Return grounding entries for the requested tables, fetching any that
    /// are missing or expired. Fails with `MetadataUnavailable` if DDL
    /// cannot be fetched for a requested table.
    pub async fn get_context(
        &self,
        tables: &[TableId],
    ) -> Result<HashMap<TableId, GroundingEntry>> {
        let mut result = HashMap::with_capacity(tables.len());

        for table in tables {
            let entry = self.get_entry(table).await?;
            result.insert(table.clone(), entry);
        }

        Ok(result)
    }

    /// Get one table's entry, from cache or via a coalesced fetch.
    async fn get_entry(&self, table: &TableId) -> Result<GroundingEntry> {
        let now = Utc::now();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(table) {
                if !entry.is_expired(now) {
                    debug!(table = %table, "Grounding cache hit");
                    return Ok(entry.clone());
                }
                debug!(table = %table, "Grounding cache entry expired");
            }
        }

        // Miss or expired: take the per-table guard so concurrent callers
        // coalesce into one upstream fetch.
        let guard = {
            let mut guards = self.fetch_guards.lock().await;
            guards
                .entry(table.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _held = guard.lock().await;

        // Another caller may have refreshed the entry while we waited.
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(table) {
                if !entry.is_expired(Utc::now()) {
                    debug!(table = %table, "Grounding refreshed by concurrent request");
                    return Ok(entry.clone());
                }
            }
        }

        let entry = self.fetch_entry(table).await?;
        self.cache
            .write()
            .await
            .insert(table.clone(), entry.clone());
        Ok(entry)
    }

    /// Fetch a fresh entry: DDL (mandatory), then profiles, then samples.
    async fn fetch_entry(&self, table: &TableId) -> Result<GroundingEntry> {
        let ddl = match self.source.fetch_ddl(std::slice::from_ref(table)).await {
            Ok(mut map) => map.remove(table).ok_or_else(|| Error::MetadataUnavailable {
                table: table.to_string(),
                reason: "source returned no DDL for table".into(),
            })?,
            Err(e) => {
                return Err(Error::MetadataUnavailable {
                    table: table.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let profile = match self.source.fetch_profiles(std::slice::from_ref(table)).await {
            Ok(mut map) => map.remove(table).map(filter_noisy_columns),
            Err(e) => {
                warn!(table = %table, error = %e, "Profile fetch failed, falling back to samples");
                None
            }
        };

        let sample_rows = if profile.is_some() {
            None
        } else {
            match self
                .source
                .fetch_samples(std::slice::from_ref(table), self.sample_row_limit)
                .await
            {
                Ok(mut map) => map.remove(table),
                Err(e) => {
                    warn!(table = %table, error = %e, "Sample fetch failed, using DDL-only grounding");
                    None
                }
            }
        };

        info!(
            table = %table,
            has_profile = profile.is_some(),
            has_samples = sample_rows.is_some(),
            "Fetched grounding entry"
        );

        Ok(GroundingEntry {
            table_id: table.clone(),
            ddl,
            profile,
            sample_rows,
            fetched_at: Utc::now(),
            ttl: self.ttl,
        })
    }

    /// Drop all cached entries (tests and admin use).
    pub async fn invalidate_all(&self) {
        self.cache.write().await.clear();
    }
}

/// Remove column profiles that are mostly null.
fn filter_noisy_columns(profile: serde_json::Value) -> serde_json::Value {
    match profile {
        serde_json::Value::Array(columns) => serde_json::Value::Array(
            columns
                .into_iter()
                .filter(|col| {
                    col.get("percent_null")
                        .and_then(|v| v.as_f64())
                        .map(|pct| pct <= MAX_NULL_PERCENT)
                        .unwrap_or(true)
                })
                .collect(),
        ),
        other => other,
    }
}
