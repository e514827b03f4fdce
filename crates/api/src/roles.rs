//! `/roles/*` and the `/users/:id/roles*` assignment endpoints, admin-only
//! management of the role/catalog-grant side of the identity & role
//! resolver (4.A).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use mitsume_auth::{roles, AuthUser};
use mitsume_core::models::{CreateRoleInput, UpdateRoleInput};
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

pub async fn list_roles(State(state): State<Arc<AppState>>, Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let roles = repository::list_roles(&state.pool).await?;
    Ok(Json(json!(roles)))
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<CreateRoleInput>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let role = repository::create_role(&state.pool, input).await?;
    Ok(Json(json!(role)))
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateRoleInput>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let role = repository::update_role(&state.pool, id, input).await?;
    Ok(Json(json!(role)))
}

pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    repository::delete_role(&state.pool, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct SetCatalogsInput {
    pub catalogs: Vec<String>,
}

/// `PUT /roles/:id/catalogs`: replaces the role's entire catalog grant set.
pub async fn set_role_catalogs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<SetCatalogsInput>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    repository::set_catalog_grants(&state.pool, id, input.catalogs).await?;
    let grants = repository::catalog_grants_for_role(&state.pool, id).await?;
    Ok(Json(json!(grants)))
}

pub async fn list_user_roles(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let user_roles = repository::roles_for_user(&state.pool, user_id).await?;
    Ok(Json(json!(user_roles)))
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleInput {
    pub role_id: Uuid,
}

pub async fn assign_user_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<AssignRoleInput>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    let assignment = repository::assign_role(&state.pool, user_id, input.role_id, auth.user_id).await?;
    Ok(Json(json!(assignment)))
}

pub async fn unassign_user_role(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, auth.user_id).await?;
    repository::unassign_role(&state.pool, user_id, role_id).await?;
    Ok(Json(json!({ "unassigned": true })))
}
