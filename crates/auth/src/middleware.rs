//! Authentication extractor/middleware. Verifies the JWT, then does a single
//! fresh lookup of the user's status, nothing else from a token is trusted
//! for authorization, since Mitsume resolves permissions per-dashboard via
//! `roles::permission_level` on every request rather than embedding them in
//! the token. Session fingerprinting, IP allow/blocklists and a revocable
//! session table are not carried here: this repo has no tenant-scoped
//! security policy to hang them off of.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::jwt::verify_token;
use mitsume_core::models::UserStatus;

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

fn bearer_token(req: &Request) -> Result<&str, StatusCode> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)
}

/// Validates the JWT, confirms the user is still `active`, and inserts
/// `AuthUser` into the request extensions for downstream handlers.
pub async fn auth_middleware(
    State(pool): State<PgPool>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&req)?;

    let claims = verify_token(token).map_err(|e| {
        tracing::warn!("jwt verification failed: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;
    let user_id = claims.user_id().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let status: Option<(UserStatus,)> = sqlx::query_as("SELECT status FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("database error checking user status: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match status {
        Some((UserStatus::Active,)) => {}
        Some((other,)) => {
            tracing::warn!("rejected request from non-active user {}: {:?}", user_id, other);
            return Err(StatusCode::UNAUTHORIZED);
        }
        None => return Err(StatusCode::UNAUTHORIZED),
    }

    req.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(req).await)
}

/// Doesn't fail if no token is present; handlers that need auth either way
/// can still check `Option<AuthUser>` via `Extension`.
pub async fn optional_auth_middleware(mut req: Request, next: Next) -> Response {
    if let Ok(token) = bearer_token(&req) {
        if let Ok(claims) = verify_token(token) {
            if let Ok(user_id) = claims.user_id() {
                req.extensions_mut().insert(AuthUser { user_id });
            }
        }
    }
    next.run(req).await
}
