use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::auth::token::TokenError;

/// Failures surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record")]
    Duplicate,
    #[error("store unreachable")]
    Unavailable,
    #[error("store query failed: {0}")]
    Backend(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            // Postgres unique violation
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => Self::Duplicate,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable,
            _ => Self::Backend(e),
        }
    }
}

/// Request-level error taxonomy. Each variant maps to exactly one status code
/// at the boundary; handlers pick the most specific kind they can determine.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request validation failed")]
    Validation(#[from] ValidationErrors),
    #[error("invalid or missing credentials")]
    Unauthenticated,
    #[error("not allowed to modify this resource")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("service temporarily unavailable")]
    Unavailable,
    #[error("internal error")]
    Internal(anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => ApiError::Conflict("resource already exists"),
            StoreError::Unavailable => ApiError::Unavailable,
            StoreError::Backend(e) => ApiError::Internal(e.into()),
        }
    }
}

// Expiry and tampering stay distinct inside the token layer; the client sees
// one generic 401 for both and is expected to drop its token and re-login.
impl From<TokenError> for ApiError {
    fn from(_: TokenError) -> Self {
        ApiError::Unauthenticated
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                serde_json::to_value(errors).ok(),
            ),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", None),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };

        // Detail goes to the server log, never into the response body.
        match &self {
            ApiError::Unavailable => error!("persistence layer unavailable"),
            ApiError::Internal(e) => error!(error = ?e, "internal error"),
            _ => {}
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
