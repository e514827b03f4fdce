//! Result cache for Mitsume
//!
//! Fingerprint -> result-set mapping with priority-class TTLs, backed by
//! Redis and guarded by a circuit breaker so a flapping cache degrades into
//! "always miss" instead of cascading into the rest of the system.

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::query_engine::QueryResult;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Priority class a cached entry is stored at; maps to a configurable TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Default TTLs in seconds; overridable via `CacheConfig`.
pub mod ttl {
    pub const LOW: u64 = 60;
    pub const NORMAL: u64 = 600;
    pub const HIGH: u64 = 3600;
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub key_prefix: String,
    pub ttl_low_secs: u64,
    pub ttl_normal_secs: u64,
    pub ttl_high_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "mitsume:".to_string(),
            ttl_low_secs: ttl::LOW,
            ttl_normal_secs: ttl::NORMAL,
            ttl_high_secs: ttl::HIGH,
        }
    }
}

impl CacheConfig {
    fn ttl_for(&self, priority: Priority) -> u64 {
        match priority {
            Priority::Low => self.ttl_low_secs,
            Priority::Normal => self.ttl_normal_secs,
            Priority::High => self.ttl_high_secs,
        }
    }
}

/// Cache key construction. Keys are deterministic across processes: equal
/// query identity must produce byte-identical keys.
pub mod keys {
    use super::CacheConfig;
    use sha2::{Digest, Sha256};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    /// Canonicalise a parameter map by sorting keys ascending and
    /// concatenating `k=v&` pairs, then fingerprint the whole query identity.
    pub fn fingerprint(query_text: &str, catalog: &str, schema: &str, params: &BTreeMap<String, String>) -> String {
        let canon_params: String = params
            .iter()
            .map(|(k, v)| format!("{k}={v}&"))
            .collect();
        let mut hasher = Sha256::new();
        hasher.update(query_text.as_bytes());
        hasher.update(b"|");
        hasher.update(catalog.as_bytes());
        hasher.update(b"|");
        hasher.update(schema.as_bytes());
        hasher.update(b"|");
        hasher.update(canon_params.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn query_key(cfg: &CacheConfig, query_text: &str, catalog: &str, schema: &str, params: &BTreeMap<String, String>) -> String {
        format!("{}query:{}", cfg.key_prefix, fingerprint(query_text, catalog, schema, params))
    }

    pub fn saved_query_index(cfg: &CacheConfig, saved_query_id: Uuid) -> String {
        format!("{}saved_query:{}:keys", cfg.key_prefix, saved_query_id)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis connection error: {0}")]
    Connection(String),
    #[error("redis command error: {0}")]
    Command(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("cache miss")]
    Miss,
    #[error("circuit breaker open - redis unavailable")]
    CircuitOpen,
}

#[derive(Clone)]
pub struct Cache {
    conn: Arc<RwLock<ConnectionManager>>,
    circuit_breaker: Arc<CircuitBreaker>,
    config: CacheConfig,
}

impl Cache {
    pub async fn new(redis_url: &str, config: CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let circuit_breaker = Arc::new(CircuitBreaker::new("redis", 5, 30, 3));
        Ok(Self {
            conn: Arc::new(RwLock::new(conn)),
            circuit_breaker,
            config,
        })
    }

    pub fn is_circuit_open(&self) -> bool {
        self.circuit_breaker.state() == CircuitState::Open
    }

    pub fn circuit_metrics(&self) -> crate::circuit_breaker::CircuitBreakerMetrics {
        self.circuit_breaker.metrics()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Fetch a previously cached result set. A cache failure is
    /// observationally equivalent to a miss, the caller never distinguishes
    /// "redis is down" from "key not present".
    pub async fn get(&self, key: &str) -> Option<QueryResult> {
        if !self.circuit_breaker.allow_request() {
            return None;
        }
        let mut conn = self.conn.write().await;
        let result: Result<Option<String>, _> = conn.get(key).await;
        match result {
            Ok(Some(json)) => {
                self.circuit_breaker.record_success();
                match serde_json::from_str(&json) {
                    Ok(value) => {
                        debug!("cache hit for key {}", key);
                        Some(value)
                    }
                    Err(e) => {
                        warn!("cache deserialization error for key {}: {}", key, e);
                        None
                    }
                }
            }
            Ok(None) => {
                self.circuit_breaker.record_success();
                debug!("cache miss for key {}", key);
                None
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                warn!("redis get error for key {}: {}", key, e);
                None
            }
        }
    }

    /// Store a result set at the TTL for `priority`. `set` failures are
    /// logged but never surfaced, the cache is an optimisation, never a
    /// source of truth.
    pub async fn set(&self, key: &str, result: &QueryResult, priority: Priority) {
        if !self.circuit_breaker.allow_request() {
            return;
        }
        let json = match serde_json::to_string(result) {
            Ok(j) => j,
            Err(e) => {
                warn!("cache serialization error for key {}: {}", key, e);
                return;
            }
        };
        let ttl = self.config.ttl_for(priority);
        let mut conn = self.conn.write().await;
        let outcome: Result<(), redis::RedisError> = conn.set_ex(key, json, ttl).await;
        match outcome {
            Ok(()) => {
                self.circuit_breaker.record_success();
                debug!("cache set for key {} (ttl {}s)", key, ttl);
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                warn!("redis set error for key {}: {}", key, e);
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        if !self.circuit_breaker.allow_request() {
            return Err(CacheError::CircuitOpen);
        }
        let mut conn = self.conn.write().await;
        let outcome: Result<(), redis::RedisError> = conn.del(key).await;
        match outcome {
            Ok(()) => {
                self.circuit_breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                warn!("redis delete error for key {}: {}", key, e);
                Err(CacheError::Command(e.to_string()))
            }
        }
    }

    /// Append `key` to the saved query's reverse-index set so `invalidate`
    /// can find it later. Failure to register is non-fatal (4.D).
    pub async fn register_for_invalidation(&self, saved_query_id: uuid::Uuid, key: &str) {
        if !self.circuit_breaker.allow_request() {
            return;
        }
        let index_key = keys::saved_query_index(&self.config, saved_query_id);
        let self_clean_ttl = 2 * self.config.ttl_high_secs;
        let mut conn = self.conn.write().await;
        let outcome: Result<(), redis::RedisError> = redis::pipe()
            .atomic()
            .sadd(&index_key, key)
            .expire(&index_key, self_clean_ttl as i64)
            .query_async(&mut *conn)
            .await;
        match outcome {
            Ok(()) => self.circuit_breaker.record_success(),
            Err(e) => {
                self.circuit_breaker.record_failure();
                warn!("failed to register key {} for invalidation: {}", key, e);
            }
        }
    }

    /// Atomic INCR+EXPIRE counter for fixed-window rate limiting (not part
    /// of 4.C's result cache proper, but the same Redis connection and
    /// circuit breaker apply). EXPIRE is only set on the first increment of
    /// a window so the window doesn't reset on every request.
    pub async fn incr_with_expiry(&self, key: &str, window_secs: u64) -> Result<u64, CacheError> {
        if !self.circuit_breaker.allow_request() {
            return Err(CacheError::CircuitOpen);
        }
        let mut conn = self.conn.write().await;
        let count: Result<u64, redis::RedisError> = conn.incr(key, 1u64).await;
        let count = match count {
            Ok(c) => {
                self.circuit_breaker.record_success();
                c
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                return Err(CacheError::Command(e.to_string()));
            }
        };
        if count == 1 {
            let _: Result<(), redis::RedisError> = conn.expire(key, window_secs as i64).await;
        }
        Ok(count)
    }

    /// Atomically read the saved query's reverse-index set, delete every
    /// listed key, then delete the set itself. Partial failures are logged;
    /// the next mutation that touches the same saved query retries.
    pub async fn invalidate(&self, saved_query_id: uuid::Uuid) {
        if !self.circuit_breaker.allow_request() {
            return;
        }
        let index_key = keys::saved_query_index(&self.config, saved_query_id);
        let mut conn = self.conn.write().await;
        let members: Result<Vec<String>, redis::RedisError> = conn.smembers(&index_key).await;
        let members = match members {
            Ok(m) => {
                self.circuit_breaker.record_success();
                m
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                warn!("failed to read invalidation index for {}: {}", saved_query_id, e);
                return;
            }
        };
        if !members.is_empty() {
            let outcome: Result<(), redis::RedisError> = conn.del(&members).await;
            if let Err(e) = outcome {
                warn!("failed to delete {} cached keys for saved query {}: {}", members.len(), saved_query_id, e);
            }
        }
        if let Err(e) = conn.del::<_, ()>(&index_key).await {
            warn!("failed to delete invalidation index for {}: {}", saved_query_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_engine::QueryResult;

    #[test]
    fn fingerprint_is_order_independent_over_params() {
        let mut a = BTreeMap::new();
        a.insert("b".to_string(), "2".to_string());
        a.insert("a".to_string(), "1".to_string());
        let mut b = BTreeMap::new();
        b.insert("a".to_string(), "1".to_string());
        b.insert("b".to_string(), "2".to_string());
        assert_eq!(
            keys::fingerprint("select 1", "hive", "default", &a),
            keys::fingerprint("select 1", "hive", "default", &b)
        );
    }

    #[test]
    fn fingerprint_differs_on_distinct_params() {
        let mut a = BTreeMap::new();
        a.insert("a".to_string(), "1".to_string());
        let mut b = BTreeMap::new();
        b.insert("a".to_string(), "2".to_string());
        assert_ne!(
            keys::fingerprint("select 1", "hive", "default", &a),
            keys::fingerprint("select 1", "hive", "default", &b)
        );
    }

    #[test]
    fn query_key_is_prefixed() {
        let cfg = CacheConfig::default();
        let key = keys::query_key(&cfg, "select 1", "hive", "default", &BTreeMap::new());
        assert!(key.starts_with("mitsume:query:"));
    }

    #[allow(dead_code)]
    fn _smoke_result_shape(r: QueryResult) -> usize {
        r.rows.len()
    }
}
