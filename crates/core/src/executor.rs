//! Cached executor (4.D), composes the query engine client (4.B) and the
//! result cache (4.C).

use crate::cache::{keys, Cache};
use crate::query_engine::{QueryEngineClient, QueryEngineError, QueryResult};
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

pub use crate::cache::Priority;

pub struct CachedExecutor {
    engine: QueryEngineClient,
    cache: Option<Cache>,
}

impl CachedExecutor {
    pub fn new(engine: QueryEngineClient, cache: Option<Cache>) -> Self {
        Self { engine, cache }
    }

    pub fn engine(&self) -> &QueryEngineClient {
        &self.engine
    }

    /// `executeCached`: if no cache is configured, delegate straight to the
    /// engine. On a cache hit, return it. On a miss, execute, store the
    /// result, and, if a saved query id was given, register the key for
    /// invalidation (non-fatal on failure).
    pub async fn execute_cached(
        &self,
        query: &str,
        catalog: &str,
        schema: &str,
        priority: Priority,
        saved_query_id: Option<Uuid>,
        params: &BTreeMap<String, String>,
    ) -> Result<QueryResult, QueryEngineError> {
        let Some(cache) = &self.cache else {
            return self.engine.execute(query, catalog, schema).await;
        };

        let key = keys::query_key(cache.config(), query, catalog, schema, params);

        if let Some(hit) = cache.get(&key).await {
            return Ok(hit);
        }

        let mut result = self.engine.execute(query, catalog, schema).await?;
        result.cached_at = Some(Utc::now());
        cache.set(&key, &result, priority).await;
        if let Some(id) = saved_query_id {
            cache.register_for_invalidation(id, &key).await;
        }
        Ok(result)
    }

    /// Invalidate every cached key registered under `saved_query_id`. Called
    /// by the store (4.I) before a saved-query update/delete transaction
    /// commits, so no reader can observe a stale cached row for the new
    /// query text.
    pub async fn invalidate_saved_query(&self, saved_query_id: Uuid) {
        if let Some(cache) = &self.cache {
            cache.invalidate(saved_query_id).await;
        }
    }
}
