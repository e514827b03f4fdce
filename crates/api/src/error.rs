//! Maps the error taxonomy in spec §7 onto a single `ApiError` that
//! implements axum's `IntoResponse`, returning `{ "error": <message> }` with
//! the status table from §6.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use mitsume_auth::roles::RoleError;
use mitsume_core::cache::CacheError;
use mitsume_core::notifier::NotifierError;
use mitsume_core::query_engine::QueryEngineError;
use mitsume_core::repository::RepoError;
use mitsume_scheduler::{AlertEngineError, CronError, SubscriptionEngineError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("permission denied")]
    PermissionDenied,
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream timeout")]
    UpstreamTimeout,
    #[error("upstream error: {0}")]
    UpstreamError(String),
    #[error("webhook failed: {0}")]
    WebhookFailed(String),
    #[error("smtp is not configured")]
    SmtpNotConfigured,
    #[error("smtp send failed: {0}")]
    SmtpFailed(String),
    #[error("invalid cron expression: {0}")]
    CronInvalid(String),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("no numeric values available for aggregation")]
    NoNumericValues,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Single-resource GETs mask a permission denial as not-found (§7): a
    /// caller who can't view a resource shouldn't be able to distinguish
    /// "doesn't exist" from "exists but isn't yours to see." Mutations keep
    /// the bare 403, only reads call this.
    pub fn mask_permission_as_not_found(self) -> Self {
        match self {
            ApiError::PermissionDenied => ApiError::NotFound,
            other => other,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::InvalidIdentifier(_)
            | ApiError::CronInvalid(_)
            | ApiError::ColumnNotFound(_)
            | ApiError::NoNumericValues => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UpstreamUnavailable(_)
            | ApiError::UpstreamTimeout
            | ApiError::UpstreamError(_)
            | ApiError::WebhookFailed(_)
            | ApiError::SmtpNotConfigured
            | ApiError::SmtpFailed(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("api error: {}", self);
        } else {
            tracing::debug!("api error: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::InvalidInput(msg) => ApiError::InvalidRequest(msg),
            RepoError::Conflict(msg) => ApiError::Conflict(msg),
            RepoError::Database(err) => err.into(),
        }
    }
}

impl From<RoleError> for ApiError {
    fn from(e: RoleError) -> Self {
        match e {
            RoleError::NotFound => ApiError::NotFound,
            RoleError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            RoleError::Conflict(msg) => ApiError::Conflict(msg),
            RoleError::Database(err) => err.into(),
        }
    }
}

impl From<QueryEngineError> for ApiError {
    fn from(e: QueryEngineError) -> Self {
        match e {
            QueryEngineError::InvalidIdentifier(msg) => ApiError::InvalidIdentifier(msg),
            QueryEngineError::UpstreamUnavailable(msg) => ApiError::UpstreamUnavailable(msg),
            QueryEngineError::UpstreamTimeout => ApiError::UpstreamTimeout,
            QueryEngineError::UpstreamError(msg) => ApiError::UpstreamError(msg),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<NotifierError> for ApiError {
    fn from(e: NotifierError) -> Self {
        match e {
            NotifierError::InvalidConfig(msg) => ApiError::InvalidRequest(msg),
            NotifierError::WebhookFailed(msg) => ApiError::WebhookFailed(msg),
            NotifierError::WebhookStatus { status, body } => ApiError::WebhookFailed(format!("status {}: {}", status, body)),
            NotifierError::SmtpNotConfigured => ApiError::SmtpNotConfigured,
            NotifierError::SmtpFailed(err) => ApiError::SmtpFailed(err.to_string()),
        }
    }
}

impl From<AlertEngineError> for ApiError {
    fn from(e: AlertEngineError) -> Self {
        match e {
            AlertEngineError::NotFound => ApiError::NotFound,
            AlertEngineError::ColumnNotFound(col) => ApiError::ColumnNotFound(col),
            AlertEngineError::NoNumericValues => ApiError::NoNumericValues,
            AlertEngineError::Database(err) => err.into(),
        }
    }
}

impl From<SubscriptionEngineError> for ApiError {
    fn from(e: SubscriptionEngineError) -> Self {
        match e {
            SubscriptionEngineError::NotFound => ApiError::NotFound,
            SubscriptionEngineError::NoChannels => ApiError::InvalidRequest("subscription has no bound channels".to_string()),
            SubscriptionEngineError::PermissionDenied => ApiError::PermissionDenied,
            SubscriptionEngineError::CronInvalid(err) => ApiError::CronInvalid(err.to_string()),
            SubscriptionEngineError::DispatchFailed(msg) => ApiError::WebhookFailed(msg),
            SubscriptionEngineError::Database(err) => err.into(),
        }
    }
}

impl From<CronError> for ApiError {
    fn from(e: CronError) -> Self {
        ApiError::CronInvalid(e.to_string())
    }
}
