//! Axum route handlers for the Applications API.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::applications::selector::{auto_apply, direct_apply, AutoApplyOutcome};
use crate::errors::AppError;
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AutoApplyRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub user_id: Uuid,
    pub job_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub user_id: Uuid,
}

/// Application row joined with its job for listing.
#[derive(Debug, Serialize, FromRow)]
pub struct ApplicationWithJobRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub title: String,
    pub company: String,
    pub status: ApplicationStatus,
    pub match_score: Option<i32>,
    pub is_auto_applied: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationListResponse {
    pub applications: Vec<ApplicationWithJobRow>,
}

/// POST /api/v1/applications/auto-apply
///
/// Precondition failures surface as 403 (not opted in) or 429 (daily cap);
/// duplicate races inside the batch are soft-skipped, never an error.
pub async fn handle_auto_apply(
    State(state): State<AppState>,
    Json(req): Json<AutoApplyRequest>,
) -> Result<Json<AutoApplyOutcome>, AppError> {
    let outcome = auto_apply(&state.db, req.user_id).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/applications
///
/// Direct apply: scores the pair (falling back to the rule-based scorer on
/// any AI failure), refreshes the match cache, then creates the application.
/// Applying twice to the same job returns 409.
pub async fn handle_apply(
    State(state): State<AppState>,
    Json(req): Json<ApplyRequest>,
) -> Result<Json<ApplicationRow>, AppError> {
    let application = direct_apply(
        &state.db,
        &state.redis,
        state.scorer.as_ref(),
        req.user_id,
        req.job_id,
    )
    .await?;

    Ok(Json(application))
}

/// GET /api/v1/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    Query(params): Query<ApplicationListQuery>,
) -> Result<Json<ApplicationListResponse>, AppError> {
    let applications = sqlx::query_as::<_, ApplicationWithJobRow>(
        r#"
        SELECT a.id, a.job_id, j.title, j.company, a.status,
               a.match_score, a.is_auto_applied, a.created_at
        FROM applications a
        JOIN jobs j ON j.id = a.job_id
        WHERE a.user_id = $1
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApplicationListResponse { applications }))
}
