//! Axum route handlers for profile and preferences CRUD.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::preferences::{
    PreferencesRow, DEFAULT_AUTO_APPLY_MAX_PER_DAY, DEFAULT_AUTO_APPLY_THRESHOLD,
};
use crate::models::profile::ProfileRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpsertProfileRequest {
    pub user_id: Uuid,
    pub headline: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_years: i32,
    #[serde(default)]
    pub preferred_roles: Vec<String>,
    pub location: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertPreferencesRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub auto_apply_enabled: bool,
    #[serde(default = "default_threshold")]
    pub auto_apply_threshold: i32,
    #[serde(default = "default_max_per_day")]
    pub auto_apply_max_per_day: i32,
    #[serde(default)]
    pub job_types: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub company_sizes: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
}

fn default_threshold() -> i32 {
    DEFAULT_AUTO_APPLY_THRESHOLD
}

fn default_max_per_day() -> i32 {
    DEFAULT_AUTO_APPLY_MAX_PER_DAY
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ProfileRow>, AppError> {
    let profile = sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(params.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Profile for user {} not found", params.user_id))
        })?;

    Ok(Json(profile))
}

/// PUT /api/v1/profile
///
/// Full-replace upsert. A profile edit invalidates nothing by itself; scores
/// refresh on the next recompute pass.
pub async fn handle_upsert_profile(
    State(state): State<AppState>,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<Json<ProfileRow>, AppError> {
    if req.experience_years < 0 {
        return Err(AppError::Validation(
            "experience_years cannot be negative".to_string(),
        ));
    }

    let profile = sqlx::query_as::<_, ProfileRow>(
        r#"
        INSERT INTO profiles
            (user_id, headline, summary, skills, experience_years, preferred_roles,
             location, salary_min, salary_max, salary_currency, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
        ON CONFLICT (user_id)
        DO UPDATE SET
            headline = EXCLUDED.headline,
            summary = EXCLUDED.summary,
            skills = EXCLUDED.skills,
            experience_years = EXCLUDED.experience_years,
            preferred_roles = EXCLUDED.preferred_roles,
            location = EXCLUDED.location,
            salary_min = EXCLUDED.salary_min,
            salary_max = EXCLUDED.salary_max,
            salary_currency = EXCLUDED.salary_currency,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(req.user_id)
    .bind(req.headline)
    .bind(req.summary)
    .bind(&req.skills)
    .bind(req.experience_years)
    .bind(&req.preferred_roles)
    .bind(req.location)
    .bind(req.salary_min)
    .bind(req.salary_max)
    .bind(req.salary_currency)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(profile))
}

/// GET /api/v1/preferences
///
/// Unsaved users get the documented defaults rather than a 404.
pub async fn handle_get_preferences(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<PreferencesRow>, AppError> {
    let prefs =
        sqlx::query_as::<_, PreferencesRow>("SELECT * FROM preferences WHERE user_id = $1")
            .bind(params.user_id)
            .fetch_optional(&state.db)
            .await?
            .unwrap_or_else(|| PreferencesRow::default_for(params.user_id));

    Ok(Json(prefs))
}

/// PUT /api/v1/preferences
pub async fn handle_upsert_preferences(
    State(state): State<AppState>,
    Json(req): Json<UpsertPreferencesRequest>,
) -> Result<Json<PreferencesRow>, AppError> {
    if !(0..=100).contains(&req.auto_apply_threshold) {
        return Err(AppError::Validation(
            "auto_apply_threshold must be between 0 and 100".to_string(),
        ));
    }
    if req.auto_apply_max_per_day < 1 {
        return Err(AppError::Validation(
            "auto_apply_max_per_day must be at least 1".to_string(),
        ));
    }

    let prefs = sqlx::query_as::<_, PreferencesRow>(
        r#"
        INSERT INTO preferences
            (user_id, auto_apply_enabled, auto_apply_threshold, auto_apply_max_per_day,
             job_types, locations, company_sizes, industries, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
        ON CONFLICT (user_id)
        DO UPDATE SET
            auto_apply_enabled = EXCLUDED.auto_apply_enabled,
            auto_apply_threshold = EXCLUDED.auto_apply_threshold,
            auto_apply_max_per_day = EXCLUDED.auto_apply_max_per_day,
            job_types = EXCLUDED.job_types,
            locations = EXCLUDED.locations,
            company_sizes = EXCLUDED.company_sizes,
            industries = EXCLUDED.industries,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(req.user_id)
    .bind(req.auto_apply_enabled)
    .bind(req.auto_apply_threshold)
    .bind(req.auto_apply_max_per_day)
    .bind(&req.job_types)
    .bind(&req.locations)
    .bind(&req.company_sizes)
    .bind(&req.industries)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(prefs))
}
