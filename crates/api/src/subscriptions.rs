//! `/subscriptions/*`: thin HTTP wrapper over the subscription engine
//! (4.F).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use mitsume_auth::AuthUser;
use mitsume_core::models::{CreateSubscriptionInput, UpdateSubscriptionInput};
use mitsume_scheduler::subscriptions;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

async fn owned_subscription(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
) -> Result<mitsume_core::models::DashboardSubscription, ApiError> {
    let subscription = subscriptions::get(&state.pool, id).await?;
    if subscription.owner_user_id != user_id {
        return Err(ApiError::PermissionDenied);
    }
    Ok(subscription)
}

pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let list = subscriptions::list_for_owner(&state.pool, auth.user_id).await?;
    Ok(Json(json!(list)))
}

pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<CreateSubscriptionInput>,
) -> Result<Json<Value>, ApiError> {
    let subscription = subscriptions::create(&state.pool, auth.user_id, input).await?;
    Ok(Json(json!(subscription)))
}

pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let subscription = owned_subscription(&state, id, auth.user_id).await.map_err(ApiError::mask_permission_as_not_found)?;
    Ok(Json(json!(subscription)))
}

pub async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSubscriptionInput>,
) -> Result<Json<Value>, ApiError> {
    owned_subscription(&state, id, auth.user_id).await?;
    let subscription = subscriptions::update(&state.pool, id, input).await?;
    Ok(Json(json!(subscription)))
}

pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    owned_subscription(&state, id, auth.user_id).await?;
    subscriptions::delete(&state.pool, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

/// `POST /subscriptions/:id/trigger`: runs the subscription immediately,
/// still re-checking the owner's dashboard access and always recomputing
/// `next_run_at` regardless of outcome.
pub async fn trigger_subscription(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    owned_subscription(&state, id, auth.user_id).await?;
    subscriptions::trigger(&state.pool, &state.router, id).await?;
    Ok(Json(json!({ "triggered": true })))
}
