//! `/queries/*` and `/catalogs/*`: the query engine client (4.B) and cached
//! executor (4.D), gated by the allowed-catalog set from the identity & role
//! resolver (4.A).

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use mitsume_auth::roles;
use mitsume_auth::AuthUser;
use mitsume_core::executor::Priority;
use mitsume_core::models::{AllowedCatalogs, CreateSavedQueryInput, QueryStatus, UpdateSavedQueryInput};
use mitsume_core::query_engine::MetadataKind;
use mitsume_core::repository;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

fn catalog_allowed(allowed: &AllowedCatalogs, catalog: &str) -> bool {
    match allowed {
        AllowedCatalogs::All => true,
        AllowedCatalogs::Named(names) => names.iter().any(|n| n == catalog),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryInput {
    pub query_text: String,
    pub catalog: String,
    pub schema: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// `POST /queries/execute`: ad-hoc query against the allow-listed catalog,
/// executed at `normal` priority (not tied to a saved query, so no
/// invalidation registration). Every attempt, success or failure, is
/// recorded to query history.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<ExecuteQueryInput>,
) -> Result<Json<Value>, ApiError> {
    let allowed = roles::allowed_catalogs(&state.pool, auth.user_id).await?;
    if !catalog_allowed(&allowed, &input.catalog) {
        return Err(ApiError::PermissionDenied);
    }

    let outcome = state
        .executor
        .execute_cached(&input.query_text, &input.catalog, &input.schema, Priority::Normal, None, &input.params)
        .await;

    match outcome {
        Ok(result) => {
            repository::record_query_history(
                &state.pool,
                auth.user_id,
                &input.query_text,
                QueryStatus::Success,
                Some(result.execution_ms),
                Some(result.row_count as i64),
                None,
            )
            .await?;
            Ok(Json(json!(result)))
        }
        Err(e) => {
            repository::record_query_history(
                &state.pool,
                auth.user_id,
                &input.query_text,
                QueryStatus::Error,
                None,
                None,
                Some(&e.to_string()),
            )
            .await?;
            Err(e.into())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let records = repository::list_query_history_for_user(&state.pool, auth.user_id, q.limit).await?;
    Ok(Json(json!(records)))
}

pub async fn list_saved_queries(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let queries = repository::list_saved_queries_for_owner(&state.pool, auth.user_id).await?;
    Ok(Json(json!(queries)))
}

pub async fn create_saved_query(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<CreateSavedQueryInput>,
) -> Result<Json<Value>, ApiError> {
    let saved = repository::create_saved_query(&state.pool, auth.user_id, input).await?;
    Ok(Json(json!(saved)))
}

pub async fn get_saved_query(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let saved = repository::get_saved_query(&state.pool, id).await?;
    if saved.owner_user_id != auth.user_id {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!(saved)))
}

/// Updating or deleting a saved query invalidates every cached result keyed
/// to it before the change is visible to the caller, per 4.D's invariant.
pub async fn update_saved_query(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSavedQueryInput>,
) -> Result<Json<Value>, ApiError> {
    let existing = repository::get_saved_query(&state.pool, id).await?;
    if existing.owner_user_id != auth.user_id {
        return Err(ApiError::PermissionDenied);
    }
    state.executor.invalidate_saved_query(id).await;
    let saved = repository::update_saved_query(&state.pool, id, input).await?;
    Ok(Json(json!(saved)))
}

pub async fn delete_saved_query(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let existing = repository::get_saved_query(&state.pool, id).await?;
    if existing.owner_user_id != auth.user_id {
        return Err(ApiError::PermissionDenied);
    }
    state.executor.invalidate_saved_query(id).await;
    repository::delete_saved_query(&state.pool, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

/// Resolves the caller's visible catalog set: the named grants, or, for
/// admins, who bypass the grant table, every catalog ever granted to any
/// role (there is no separate global catalog registry).
async fn visible_catalogs(state: &AppState, allowed: &AllowedCatalogs) -> Result<Vec<String>, ApiError> {
    match allowed {
        AllowedCatalogs::All => Ok(repository::list_known_catalogs(&state.pool).await?),
        AllowedCatalogs::Named(names) => Ok(names.clone()),
    }
}

pub async fn list_catalogs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let allowed = roles::allowed_catalogs(&state.pool, auth.user_id).await?;
    let catalogs = visible_catalogs(&state, &allowed).await?;
    let listed = state.executor.engine().catalogs(&catalogs).await;
    Ok(Json(json!(listed)))
}

pub async fn list_schemas(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(catalog): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let allowed = roles::allowed_catalogs(&state.pool, auth.user_id).await?;
    if !catalog_allowed(&allowed, &catalog) {
        return Err(ApiError::PermissionDenied);
    }
    let schemas = state.executor.engine().schemas(&catalog, &state.scheduler_config.default_schema).await?;
    Ok(Json(json!(schemas)))
}

pub async fn list_tables(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((catalog, schema)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let allowed = roles::allowed_catalogs(&state.pool, auth.user_id).await?;
    if !catalog_allowed(&allowed, &catalog) {
        return Err(ApiError::PermissionDenied);
    }
    let tables = state.executor.engine().tables(&catalog, &schema).await?;
    Ok(Json(json!(tables)))
}

pub async fn list_columns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((catalog, schema, table)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let allowed = roles::allowed_catalogs(&state.pool, auth.user_id).await?;
    if !catalog_allowed(&allowed, &catalog) {
        return Err(ApiError::PermissionDenied);
    }
    let columns = state.executor.engine().columns(&catalog, &schema, &table).await?;
    Ok(Json(json!(columns)))
}

#[derive(Debug, Deserialize)]
pub struct SearchMetadataQuery {
    pub term: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    50
}

pub async fn search_metadata(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(q): Query<SearchMetadataQuery>,
) -> Result<Json<Value>, ApiError> {
    let allowed = roles::allowed_catalogs(&state.pool, auth.user_id).await?;
    let catalogs = visible_catalogs(&state, &allowed).await?;

    let kind = match q.kind.as_deref() {
        Some("table") => MetadataKind::Table,
        Some("column") => MetadataKind::Column,
        _ => MetadataKind::All,
    };

    let hits = state
        .executor
        .engine()
        .search_metadata(&q.term, kind, q.limit, &catalogs, &state.scheduler_config.default_schema)
        .await;
    Ok(Json(json!(hits)))
}
