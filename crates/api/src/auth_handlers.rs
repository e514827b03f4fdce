//! `/auth/*`: login, registration (pending-approval by default), identity,
//! and a Google OAuth stub (spec §6 names the endpoints; the OAuth exchange
//! itself is an external collaborator this repo doesn't implement).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::{Extension, Json};
use mitsume_auth::{generate_token, hash_password, AuthUser};
use mitsume_core::models::{RegisterUserInput, User, UserStatus};
use mitsume_core::repository;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
    user: User,
}

/// `POST /auth/login`: accepts email or username in `identifier`. Rejects
/// non-active accounts (pending/disabled) with the same `unauthenticated`
/// outcome as a bad password, so the login surface never leaks account
/// status to an unauthenticated caller.
pub async fn login(State(state): State<Arc<AppState>>, Json(input): Json<LoginInput>) -> Result<Json<Value>, ApiError> {
    let user = repository::get_user_by_identifier(&state.pool, &input.identifier)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    if user.status != UserStatus::Active {
        return Err(ApiError::Unauthenticated);
    }

    let valid = mitsume_auth::verify_password(&input.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        return Err(ApiError::Unauthenticated);
    }

    let token = generate_token(user.id).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(json!(TokenResponse { token, user })))
}

/// `POST /auth/register`: new local accounts start `pending` and wait on
/// admin approval (`POST /users/:id/approve`); this handler never returns a
/// token.
pub async fn register(State(state): State<Arc<AppState>>, Json(input): Json<RegisterUserInput>) -> Result<Json<User>, ApiError> {
    if input.email.is_none() && input.username.is_none() {
        return Err(ApiError::InvalidRequest("one of email/username is required".to_string()));
    }
    if repository::get_user_by_identifier(&state.pool, input.email.as_deref().or(input.username.as_deref()).unwrap())
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("an account with that email or username already exists".to_string()));
    }

    let password_hash = hash_password(&input.password).map_err(|e| ApiError::Internal(e.to_string()))?;
    let user = repository::create_user(&state.pool, input, password_hash, UserStatus::Pending).await?;
    Ok(Json(user))
}

pub async fn me(State(state): State<Arc<AppState>>, Extension(auth): Extension<AuthUser>) -> Result<Json<User>, ApiError> {
    let user = repository::get_user(&state.pool, auth.user_id).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    #[allow(dead_code)]
    pub code: Option<String>,
}

/// `GET /auth/google`: redirects to Google's OAuth consent screen. The
/// actual authorization-code exchange in `google_callback` is a stub, the
/// identity provider round trip is treated as an external collaborator.
pub async fn google_start(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    let client_id = state
        .config
        .google_oauth_client_id
        .as_deref()
        .ok_or_else(|| ApiError::InvalidRequest("Google OAuth is not configured".to_string()))?;
    let redirect_url = state
        .config
        .google_oauth_redirect_url
        .as_deref()
        .ok_or_else(|| ApiError::InvalidRequest("Google OAuth is not configured".to_string()))?;

    let url = format!(
        "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile",
        client_id, redirect_url
    );
    Ok(Redirect::to(&url))
}

pub async fn google_callback(
    State(_state): State<Arc<AppState>>,
    Query(_query): Query<GoogleCallbackQuery>,
) -> Result<Json<Value>, ApiError> {
    Err(ApiError::InvalidRequest("Google OAuth code exchange is not implemented".to_string()))
}
