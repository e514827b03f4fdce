//! `/notification-channels/*`: CRUD plus the test-send endpoint that backs
//! the notification router's (4.G) verification flow.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use mitsume_auth::AuthUser;
use mitsume_core::models::{CreateChannelInput, NotificationChannel, UpdateChannelInput};
use mitsume_core::repository;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

async fn owned_channel(state: &AppState, id: Uuid, user_id: Uuid) -> Result<NotificationChannel, ApiError> {
    let channel = repository::get_channel(&state.pool, id).await?;
    if channel.owner_user_id != user_id {
        return Err(ApiError::PermissionDenied);
    }
    Ok(channel)
}

pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let channels = repository::list_channels_for_owner(&state.pool, auth.user_id).await?;
    Ok(Json(json!(channels)))
}

pub async fn create_channel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<CreateChannelInput>,
) -> Result<Json<Value>, ApiError> {
    state.router.validate_config(input.channel_type, &input.config_json)?;
    let channel = repository::create_channel(&state.pool, auth.user_id, input).await?;
    Ok(Json(json!(channel)))
}

pub async fn get_channel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let channel = owned_channel(&state, id, auth.user_id).await.map_err(ApiError::mask_permission_as_not_found)?;
    Ok(Json(json!(channel)))
}

pub async fn update_channel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateChannelInput>,
) -> Result<Json<Value>, ApiError> {
    let existing = owned_channel(&state, id, auth.user_id).await?;
    if let Some(config) = &input.config_json {
        state.router.validate_config(existing.channel_type, config)?;
    }
    let channel = repository::update_channel(&state.pool, id, input).await?;
    Ok(Json(json!(channel)))
}

pub async fn delete_channel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    owned_channel(&state, id, auth.user_id).await?;
    repository::delete_channel(&state.pool, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn test_channel(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let channel = owned_channel(&state, id, auth.user_id).await?;
    state.router.test_channel(&state.pool, &channel).await?;
    Ok(Json(json!({ "verified": true })))
}
