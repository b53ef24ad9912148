use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// AI scoring failures are deliberately absent: the scorer absorbs them and
/// falls back to the deterministic strategy, so they never reach a handler.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Auto-apply is not enabled for this user")]
    AutoApplyDisabled,

    #[error("Daily auto-apply limit reached ({limit} per day)")]
    RateLimitExceeded { limit: i32 },

    #[error("An application for this job already exists")]
    DuplicateApplication,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::AutoApplyDisabled => (
                StatusCode::FORBIDDEN,
                "AUTO_APPLY_DISABLED",
                "Enable auto-apply in your preferences first".to_string(),
            ),
            AppError::RateLimitExceeded { limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                format!("Daily auto-apply limit of {limit} reached; try again tomorrow"),
            ),
            AppError::DuplicateApplication => (
                StatusCode::CONFLICT,
                "DUPLICATE_APPLICATION",
                "You have already applied to this job".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// True when a sqlx error is a unique-constraint violation (Postgres 23505).
/// The applications table relies on its (user_id, job_id) constraint as the
/// sole duplicate-prevention mechanism.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
