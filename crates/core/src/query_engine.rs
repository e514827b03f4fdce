//! Pooled client over the federated query engine (4.B).
//!
//! Connections are memoised in a concurrent map keyed by `(catalog, schema)`,
//! mirroring the write-once-per-key / lock-free-read shape the design notes
//! call for: a mutex-guarded map is enough at this scale.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Column, PgPool, Row, TypeInfo, ValueRef};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

#[derive(Debug, Error)]
pub enum QueryEngineError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream timeout")]
    UpstreamTimeout,
    #[error("upstream error: {0}")]
    UpstreamError(String),
}

/// A normalised result set: columns reported by the engine, rows decoded
/// position-by-position per the normalisation rules in 4.B.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub execution_ms: i64,
    pub cached_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn validate_identifier(value: &str) -> Result<(), QueryEngineError> {
    if value.is_empty() || !IDENTIFIER_RE.is_match(value) {
        return Err(QueryEngineError::InvalidIdentifier(value.to_string()));
    }
    Ok(())
}

/// Escape `'`, `%`, `_` for use inside a `LIKE` pattern.
fn escape_like_term(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('\'', "''")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Table,
    Column,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataHit {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub column: Option<String>,
}

struct PoolEntry {
    pool: PgPool,
}

/// Pooled connections keyed by `(catalog, schema)`. First use opens the pool
/// and pings it; a failed ping is not retained so the next call retries from
/// scratch rather than caching a dead connection.
pub struct QueryEngineClient {
    dsn_template: String,
    pools: AsyncMutex<BTreeMap<(String, String), PoolEntry>>,
}

impl QueryEngineClient {
    /// `dsn_template` is a Postgres-style connection string with `{catalog}`
    /// and `{schema}` placeholders the engine substitutes per pool.
    pub fn new(dsn_template: impl Into<String>) -> Self {
        Self {
            dsn_template: dsn_template.into(),
            pools: AsyncMutex::new(BTreeMap::new()),
        }
    }

    async fn pool_for(&self, catalog: &str, schema: &str) -> Result<PgPool, QueryEngineError> {
        let key = (catalog.to_string(), schema.to_string());
        let mut pools = self.pools.lock().await;
        if let Some(entry) = pools.get(&key) {
            return Ok(entry.pool.clone());
        }
        let dsn = self
            .dsn_template
            .replace("{catalog}", catalog)
            .replace("{schema}", schema);
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(0)
            .max_lifetime(Duration::from_secs(3600))
            .acquire_timeout(Duration::from_secs(60))
            .connect(&dsn)
            .await
            .map_err(|e| QueryEngineError::UpstreamUnavailable(e.to_string()))?;

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            return Err(QueryEngineError::UpstreamUnavailable(e.to_string()));
        }

        pools.insert(key, PoolEntry { pool: pool.clone() });
        Ok(pool)
    }

    /// Execute `query` against `(catalog, schema)` with a 60 s deadline.
    pub async fn execute(&self, query: &str, catalog: &str, schema: &str) -> Result<QueryResult, QueryEngineError> {
        validate_identifier(catalog)?;
        validate_identifier(schema)?;

        let pool = self.pool_for(catalog, schema).await?;
        let started = std::time::Instant::now();

        let rows = tokio::time::timeout(Duration::from_secs(60), sqlx::query(query).fetch_all(&pool))
            .await
            .map_err(|_| QueryEngineError::UpstreamTimeout)?
            .map_err(|e| QueryEngineError::UpstreamError(e.to_string()))?;

        let columns: Vec<String> = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let decoded_rows: Vec<Vec<serde_json::Value>> = rows.iter().map(decode_row).collect();

        Ok(QueryResult {
            row_count: decoded_rows.len(),
            columns,
            rows: decoded_rows,
            execution_ms: started.elapsed().as_millis() as i64,
            cached_at: None,
        })
    }

    pub async fn catalogs(&self, allow_list: &[String]) -> Vec<String> {
        allow_list.to_vec()
    }

    pub async fn schemas(&self, catalog: &str, schema_default: &str) -> Result<Vec<String>, QueryEngineError> {
        validate_identifier(catalog)?;
        let pool = self.pool_for(catalog, schema_default).await?;
        let rows = sqlx::query("SELECT schema_name FROM information_schema.schemata ORDER BY schema_name")
            .fetch_all(&pool)
            .await
            .map_err(|e| QueryEngineError::UpstreamError(e.to_string()))?;
        Ok(rows.iter().filter_map(|r| r.try_get::<String, _>(0).ok()).collect())
    }

    pub async fn tables(&self, catalog: &str, schema: &str) -> Result<Vec<String>, QueryEngineError> {
        validate_identifier(catalog)?;
        validate_identifier(schema)?;
        let pool = self.pool_for(catalog, schema).await?;
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = $1 ORDER BY table_name",
        )
        .bind(schema)
        .fetch_all(&pool)
        .await
        .map_err(|e| QueryEngineError::UpstreamError(e.to_string()))?;
        Ok(rows.iter().filter_map(|r| r.try_get::<String, _>(0).ok()).collect())
    }

    pub async fn columns(&self, catalog: &str, schema: &str, table: &str) -> Result<Vec<String>, QueryEngineError> {
        validate_identifier(catalog)?;
        validate_identifier(schema)?;
        validate_identifier(table)?;
        let pool = self.pool_for(catalog, schema).await?;
        let rows = sqlx::query(
            "SELECT column_name FROM information_schema.columns WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&pool)
        .await
        .map_err(|e| QueryEngineError::UpstreamError(e.to_string()))?;
        Ok(rows.iter().filter_map(|r| r.try_get::<String, _>(0).ok()).collect())
    }

    /// Search `information_schema.tables`/`.columns` for `term` across every
    /// catalog in the caller-provided allow-list. Per-catalog errors are
    /// swallowed so one inaccessible catalog never shadows results; results
    /// are truncated at `limit`.
    pub async fn search_metadata(
        &self,
        term: &str,
        kind: MetadataKind,
        limit: usize,
        catalogs: &[String],
        schema_default: &str,
    ) -> Vec<MetadataHit> {
        let pattern = format!("%{}%", escape_like_term(term));
        let mut hits = Vec::new();

        for catalog in catalogs {
            if hits.len() >= limit {
                break;
            }
            let pool = match self.pool_for(catalog, schema_default).await {
                Ok(p) => p,
                Err(e) => {
                    warn!("metadata search skipping catalog {}: {}", catalog, e);
                    continue;
                }
            };

            if matches!(kind, MetadataKind::Table | MetadataKind::All) {
                let rows = sqlx::query(
                    "SELECT table_schema, table_name FROM information_schema.tables WHERE table_name ILIKE $1 ESCAPE '\\' ORDER BY table_name",
                )
                .bind(&pattern)
                .fetch_all(&pool)
                .await;
                match rows {
                    Ok(rows) => {
                        for row in rows {
                            if hits.len() >= limit {
                                break;
                            }
                            if let (Ok(schema), Ok(table)) =
                                (row.try_get::<String, _>(0), row.try_get::<String, _>(1))
                            {
                                hits.push(MetadataHit { catalog: catalog.clone(), schema, table, column: None });
                            }
                        }
                    }
                    Err(e) => {
                        debug!("metadata table search failed for catalog {}: {}", catalog, e);
                        continue;
                    }
                }
            }

            if matches!(kind, MetadataKind::Column | MetadataKind::All) && hits.len() < limit {
                let rows = sqlx::query(
                    "SELECT table_schema, table_name, column_name FROM information_schema.columns WHERE column_name ILIKE $1 ESCAPE '\\' ORDER BY table_name",
                )
                .bind(&pattern)
                .fetch_all(&pool)
                .await;
                match rows {
                    Ok(rows) => {
                        for row in rows {
                            if hits.len() >= limit {
                                break;
                            }
                            if let (Ok(schema), Ok(table), Ok(column)) = (
                                row.try_get::<String, _>(0),
                                row.try_get::<String, _>(1),
                                row.try_get::<String, _>(2),
                            ) {
                                hits.push(MetadataHit { catalog: catalog.clone(), schema, table, column: Some(column) });
                            }
                        }
                    }
                    Err(e) => {
                        debug!("metadata column search failed for catalog {}: {}", catalog, e);
                        continue;
                    }
                }
            }
        }

        hits.truncate(limit);
        hits
    }
}

/// Decode one row into JSON cells: nulls stay null, byte sequences and
/// timestamps normalise to strings, everything else passes through.
fn decode_row(row: &sqlx::postgres::PgRow) -> Vec<serde_json::Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let raw = row.try_get_raw(i);
            let is_null = raw.as_ref().map(|v| v.is_null()).unwrap_or(true);
            if is_null {
                return serde_json::Value::Null;
            }
            match col.type_info().name() {
                "BYTEA" => row
                    .try_get::<Vec<u8>, _>(i)
                    .ok()
                    .map(|b| serde_json::Value::String(String::from_utf8_lossy(&b).into_owned()))
                    .unwrap_or(serde_json::Value::Null),
                "TIMESTAMP" | "TIMESTAMPTZ" => row
                    .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
                    .ok()
                    .map(|t| serde_json::Value::String(t.to_rfc3339()))
                    .unwrap_or(serde_json::Value::Null),
                "INT4" | "INT2" => row
                    .try_get::<i32, _>(i)
                    .ok()
                    .map(|v| serde_json::Value::from(v))
                    .unwrap_or(serde_json::Value::Null),
                "INT8" => row
                    .try_get::<i64, _>(i)
                    .ok()
                    .map(|v| serde_json::Value::from(v))
                    .unwrap_or(serde_json::Value::Null),
                "FLOAT4" | "FLOAT8" | "NUMERIC" => row
                    .try_get::<f64, _>(i)
                    .ok()
                    .map(|v| serde_json::json!(v))
                    .unwrap_or(serde_json::Value::Null),
                "BOOL" => row
                    .try_get::<bool, _>(i)
                    .ok()
                    .map(serde_json::Value::Bool)
                    .unwrap_or(serde_json::Value::Null),
                _ => row
                    .try_get::<String, _>(i)
                    .ok()
                    .map(serde_json::Value::String)
                    .unwrap_or(serde_json::Value::Null),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_validation_rejects_empty_and_special_chars() {
        assert!(validate_identifier("hive").is_ok());
        assert!(validate_identifier("my_schema_1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("bad;name").is_err());
        assert!(validate_identifier("bad name").is_err());
    }

    #[test]
    fn like_term_escapes_wildcards() {
        let escaped = escape_like_term("100%_done's");
        assert_eq!(escaped, "100\\%\\_done''s");
    }
}
