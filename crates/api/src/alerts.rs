//! `/alerts/*`: thin HTTP wrapper over the alert engine (4.E). CRUD checks
//! only ownership; evaluation/dispatch gating lives in the scheduler loop
//! and in `evaluate`/`test` themselves.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use mitsume_auth::AuthUser;
use mitsume_core::models::{CreateAlertInput, UpdateAlertInput};
use mitsume_scheduler::alerts;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

async fn owned_alert(state: &AppState, id: Uuid, user_id: Uuid) -> Result<mitsume_core::models::QueryAlert, ApiError> {
    let alert = alerts::get(&state.pool, id).await?;
    if alert.owner_user_id != user_id {
        return Err(ApiError::PermissionDenied);
    }
    Ok(alert)
}

pub async fn list_alerts(State(state): State<Arc<AppState>>, Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let list = alerts::list_for_owner(&state.pool, auth.user_id).await?;
    Ok(Json(json!(list)))
}

pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<CreateAlertInput>,
) -> Result<Json<Value>, ApiError> {
    let alert = alerts::create(&state.pool, auth.user_id, input).await?;
    Ok(Json(json!(alert)))
}

pub async fn get_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let alert = owned_alert(&state, id, auth.user_id).await.map_err(ApiError::mask_permission_as_not_found)?;
    Ok(Json(json!(alert)))
}

pub async fn update_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateAlertInput>,
) -> Result<Json<Value>, ApiError> {
    owned_alert(&state, id, auth.user_id).await?;
    let alert = alerts::update(&state.pool, id, input).await?;
    Ok(Json(json!(alert)))
}

pub async fn delete_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    owned_alert(&state, id, auth.user_id).await?;
    alerts::delete(&state.pool, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

/// `POST /alerts/:id/test`: evaluates once without touching
/// `last_checked_at`/`next_check_at` or writing history.
pub async fn test_alert(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    owned_alert(&state, id, auth.user_id).await?;
    let evaluation = alerts::test(
        &state.pool,
        &state.executor,
        id,
        &state.scheduler_config.default_catalog,
        &state.scheduler_config.default_schema,
    )
    .await?;
    Ok(Json(json!(evaluation)))
}

pub async fn alert_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    owned_alert(&state, id, auth.user_id).await.map_err(ApiError::mask_permission_as_not_found)?;
    let history = alerts::history_for(&state.pool, id).await?;
    Ok(Json(json!(history)))
}
