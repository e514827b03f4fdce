//! Redis-based rate limiting middleware.
//!
//! - Atomic INCR+EXPIRE for race-condition-free counting
//! - Trusted proxy mode for correct client IP extraction
//! - Configurable limits per endpoint class: login (brute-force guard) vs.
//!   general API (per-user)

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::OnceLock;

use crate::AppState;

struct TrustedProxyConfig {
    trusted_ips: Vec<IpAddr>,
    trust_all: bool,
}

static TRUSTED_PROXY_CONFIG: OnceLock<TrustedProxyConfig> = OnceLock::new();

fn get_trusted_proxy_config() -> &'static TrustedProxyConfig {
    TRUSTED_PROXY_CONFIG.get_or_init(|| {
        let trust_all = std::env::var("TRUST_ALL_PROXIES").map(|v| v.to_lowercase() == "true").unwrap_or(false);
        if trust_all {
            tracing::warn!("TRUST_ALL_PROXIES is enabled, X-Forwarded-For is trusted from any source");
        }

        let trusted_ips: Vec<IpAddr> = std::env::var("TRUSTED_PROXY_CIDRS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<IpAddr>() {
                    Ok(ip) => Some(ip),
                    Err(_) => {
                        tracing::warn!("invalid entry in TRUSTED_PROXY_CIDRS: {}", trimmed);
                        None
                    }
                }
            })
            .collect();

        TrustedProxyConfig { trusted_ips, trust_all }
    })
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl RateLimitConfig {
    pub fn login() -> Self {
        Self { max_requests: 5, window_seconds: 60 }
    }

    pub fn api(rpm: u32, burst: u32) -> Self {
        Self { max_requests: rpm.max(burst), window_seconds: 60 }
    }

    pub fn public() -> Self {
        Self { max_requests: 60, window_seconds: 60 }
    }
}

#[derive(Debug, Clone)]
pub enum RateLimitKey {
    Ip(String),
    User(String),
    IpPath(String, String),
}

impl RateLimitKey {
    pub fn to_redis_key(&self, prefix: &str) -> String {
        match self {
            RateLimitKey::Ip(ip) => format!("mitsume:ratelimit:{}:ip:{}", prefix, ip),
            RateLimitKey::User(user_id) => format!("mitsume:ratelimit:{}:user:{}", prefix, user_id),
            RateLimitKey::IpPath(ip, path) => {
                let path_hash = path.replace('/', "_");
                format!("mitsume:ratelimit:{}:ip:{}:{}", prefix, ip, path_hash)
            }
        }
    }
}

/// Atomic counter via `Cache::incr_with_expiry`; fails open (allows the
/// request) if the cache is unavailable, since a degraded rate limiter is
/// strictly better than a degraded API.
pub async fn check_rate_limit(
    cache: &mitsume_core::cache::Cache,
    key: &str,
    config: &RateLimitConfig,
) -> Result<(bool, u64, u32), String> {
    let count = cache.incr_with_expiry(key, config.window_seconds).await.map_err(|e| e.to_string())?;
    let is_allowed = count <= config.max_requests as u64;
    let remaining = (config.max_requests as u64).saturating_sub(count) as u32;
    Ok((is_allowed, count, remaining))
}

pub fn extract_client_ip(headers: &HeaderMap, connection_ip: Option<IpAddr>) -> String {
    let proxy_config = get_trusted_proxy_config();

    let from_trusted_proxy = match connection_ip {
        Some(ip) => proxy_config.trust_all || proxy_config.trusted_ips.contains(&ip),
        None => proxy_config.trust_all,
    };

    if from_trusted_proxy {
        if let Some(forwarded) = headers.get("x-forwarded-for") {
            if let Ok(value) = forwarded.to_str() {
                if let Some(ip) = value.split(',').next() {
                    let trimmed = ip.trim();
                    if trimmed.parse::<IpAddr>().is_ok() {
                        return trimmed.to_string();
                    }
                }
            }
        }
        if let Some(real_ip) = headers.get("x-real-ip") {
            if let Ok(value) = real_ip.to_str() {
                if value.parse::<IpAddr>().is_ok() {
                    return value.to_string();
                }
            }
        }
    }

    connection_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Per-IP+path limiting for `/auth/login` (brute-force guard).
pub async fn rate_limit_login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.rate_limit_enabled {
        return next.run(request).await;
    }
    let config = RateLimitConfig::login();
    let headers = request.headers().clone();
    let ip = extract_client_ip(&headers, Some(addr.ip()));
    let path = request.uri().path().to_string();
    let key = RateLimitKey::IpPath(ip.clone(), path).to_redis_key("login");

    if let Some(ref cache) = state.cache {
        match check_rate_limit(cache, &key, &config).await {
            Ok((allowed, count, remaining)) => {
                if !allowed {
                    tracing::warn!("rate limit exceeded for login from {} (count: {})", ip, count);
                    return rate_limit_response(config.window_seconds, remaining);
                }
            }
            Err(e) => tracing::debug!("rate limit check failed, allowing request: {}", e),
        }
    }

    next.run(request).await
}

/// Per-user limiting for authenticated endpoints, tuned by `RATE_LIMIT_RPM`/
/// `RATE_LIMIT_BURST`.
pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    axum::Extension(auth): axum::Extension<mitsume_auth::AuthUser>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.rate_limit_enabled {
        return next.run(request).await;
    }
    let config = RateLimitConfig::api(state.config.rate_limit_rpm, state.config.rate_limit_burst);
    let key = RateLimitKey::User(auth.user_id.to_string()).to_redis_key("api");

    if let Some(ref cache) = state.cache {
        match check_rate_limit(cache, &key, &config).await {
            Ok((allowed, count, remaining)) => {
                if !allowed {
                    tracing::warn!("api rate limit exceeded for user {} (count: {})", auth.user_id, count);
                    return rate_limit_response(config.window_seconds, remaining);
                }
            }
            Err(e) => tracing::debug!("rate limit check failed, allowing request: {}", e),
        }
    }

    next.run(request).await
}

/// Per-IP limiting for unauthenticated public endpoints.
pub async fn rate_limit_public(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.rate_limit_enabled {
        return next.run(request).await;
    }
    let config = RateLimitConfig::public();
    let headers = request.headers().clone();
    let ip = extract_client_ip(&headers, Some(addr.ip()));
    let key = RateLimitKey::Ip(ip.clone()).to_redis_key("public");

    if let Some(ref cache) = state.cache {
        match check_rate_limit(cache, &key, &config).await {
            Ok((allowed, count, remaining)) => {
                if !allowed {
                    tracing::warn!("public rate limit exceeded for {} (count: {})", ip, count);
                    return rate_limit_response(config.window_seconds, remaining);
                }
            }
            Err(e) => tracing::debug!("rate limit check failed, allowing request: {}", e),
        }
    }

    next.run(request).await
}

fn rate_limit_response(retry_after: u64, remaining: u32) -> Response {
    let body = json!({
        "error": "rate limit exceeded",
        "retry_after_seconds": retry_after,
        "remaining": remaining,
    });
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("Retry-After", retry_after.to_string()), ("X-RateLimit-Remaining", remaining.to_string())],
        Json(body),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_key_includes_prefix_and_kind() {
        let ip_key = RateLimitKey::Ip("192.168.1.1".to_string());
        assert_eq!(ip_key.to_redis_key("public"), "mitsume:ratelimit:public:ip:192.168.1.1");

        let user_key = RateLimitKey::User("user-123".to_string());
        assert_eq!(user_key.to_redis_key("api"), "mitsume:ratelimit:api:user:user-123");
    }

    #[test]
    fn login_config_is_five_per_minute() {
        let login = RateLimitConfig::login();
        assert_eq!(login.max_requests, 5);
        assert_eq!(login.window_seconds, 60);
    }
}
