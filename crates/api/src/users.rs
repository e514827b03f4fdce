//! `/users/*`: admin-only user lifecycle endpoints (approve/disable/enable)
//! and the pending-user queue view (4.A).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use mitsume_auth::{roles, AuthUser};
use mitsume_core::models::UserStatus;
use mitsume_core::repository;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

async fn require_admin(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    if roles::is_admin(&state.pool, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::PermissionDenied)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub status: Option<UserStatus>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let users = repository::list_users(&state.pool, query.status).await?;
    Ok(Json(json!(users)))
}

pub async fn approve_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let user = repository::approve_user(&state.pool, id, auth.user_id).await?;
    Ok(Json(json!(user)))
}

pub async fn disable_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let user = repository::disable_user(&state.pool, id).await?;
    Ok(Json(json!(user)))
}

pub async fn enable_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let user = repository::enable_user(&state.pool, id).await?;
    Ok(Json(json!(user)))
}
