//! `/dashboards/*`: the dashboard & saved-query store (4.I), gated by the
//! identity & role resolver (4.A) on every read and write.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use mitsume_auth::roles;
use mitsume_auth::AuthUser;
use mitsume_core::models::{
    CreateDashboardInput, CreateWidgetInput, EffectivePermission, GrantPermissionInput, UpdateDashboardInput,
    UpdateWidgetInput, WidgetBatchInput,
};
use mitsume_core::repository;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

async fn require_view(state: &AppState, dashboard_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
    if roles::can_view(&state.pool, dashboard_id, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::PermissionDenied)
    }
}

async fn require_edit(state: &AppState, dashboard_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
    if roles::can_edit(&state.pool, dashboard_id, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::PermissionDenied)
    }
}

async fn require_owner(state: &AppState, dashboard_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
    match roles::permission_level(&state.pool, dashboard_id, user_id).await? {
        EffectivePermission::Owner => Ok(()),
        _ => Err(ApiError::PermissionDenied),
    }
}

pub async fn list_dashboards(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let dashboards = repository::list_dashboards_for_owner(&state.pool, auth.user_id).await?;
    Ok(Json(json!(dashboards)))
}

pub async fn create_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<CreateDashboardInput>,
) -> Result<Json<Value>, ApiError> {
    let dashboard = repository::create_dashboard(&state.pool, auth.user_id, input).await?;
    Ok(Json(json!(dashboard)))
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_view(&state, id, auth.user_id).await.map_err(ApiError::mask_permission_as_not_found)?;
    let dashboard = repository::get_dashboard(&state.pool, id).await?;
    Ok(Json(json!(dashboard)))
}

pub async fn update_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateDashboardInput>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    let dashboard = repository::update_dashboard(&state.pool, id, input).await?;
    Ok(Json(json!(dashboard)))
}

pub async fn delete_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_owner(&state, id, auth.user_id).await?;
    repository::delete_dashboard(&state.pool, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn save_as_draft(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    repository::save_as_draft(&state.pool, id).await?;
    Ok(Json(json!({ "is_draft": true })))
}

pub async fn publish_draft(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    repository::publish_draft(&state.pool, id).await?;
    Ok(Json(json!({ "is_draft": false })))
}

pub async fn list_widgets(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_view(&state, id, auth.user_id).await.map_err(ApiError::mask_permission_as_not_found)?;
    let widgets = repository::list_widgets(&state.pool, id).await?;
    Ok(Json(json!(widgets)))
}

pub async fn batch_widgets(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<WidgetBatchInput>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    let widgets = repository::apply_widget_batch(&state.pool, id, input.delete, input.create, input.update).await?;
    Ok(Json(json!(widgets)))
}

pub async fn create_widget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateWidgetInput>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    let widget = repository::create_widget(&state.pool, id, input).await?;
    Ok(Json(json!(widget)))
}

pub async fn update_widget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((id, widget_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateWidgetInput>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    let widget = repository::update_widget(&state.pool, id, widget_id, input).await?;
    Ok(Json(json!(widget)))
}

pub async fn delete_widget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((id, widget_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    repository::delete_widget(&state.pool, id, widget_id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_view(&state, id, auth.user_id).await.map_err(ApiError::mask_permission_as_not_found)?;
    let permissions = repository::list_permissions(&state.pool, id).await?;
    Ok(Json(json!(permissions)))
}

/// Granting and revoking dashboard access are themselves edit-level actions
/// on the dashboard; `roles::grant` additionally rejects a self-grant on the
/// owner.
pub async fn grant_permission(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<GrantPermissionInput>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    let permission_id = roles::grant(&state.pool, id, auth.user_id, input).await?;
    Ok(Json(json!({ "id": permission_id })))
}

pub async fn revoke_permission(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    require_edit(&state, id, auth.user_id).await?;
    roles::revoke(&state.pool, permission_id).await?;
    Ok(Json(json!({ "revoked": true })))
}
