//! Axum route handlers for the Matching API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::cache::{
    invalidate_listing, list_matches, recompute_matches, toggle_favorite, toggle_hidden,
};
use crate::models::job::JobRow;
use crate::models::matching::{MatchCacheEntryRow, MatchScore, MatchedJobRow};
use crate::models::preferences::PreferencesRow;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserIdBody {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MatchListQuery {
    pub user_id: Uuid,
    pub min_score: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct MatchListResponse {
    pub matches: Vec<MatchedJobRow>,
}

#[derive(Debug, Serialize)]
pub struct MatchFlagResponse {
    pub job_id: Uuid,
    pub match_score: MatchScore,
    pub is_favorite: bool,
    pub is_hidden: bool,
}

#[derive(Debug, Serialize)]
pub struct RecomputeResponse {
    pub jobs_scored: usize,
}

#[derive(Debug, Deserialize)]
pub struct JobSearchQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct JobSearchResponse {
    pub jobs: Vec<JobRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/jobs
///
/// Lists active jobs. When a user_id is supplied, the user's preference
/// filter lists (job types, locations) narrow the result. The scorer never
/// sees these filters.
pub async fn handle_search_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobSearchQuery>,
) -> Result<Json<JobSearchResponse>, AppError> {
    let prefs = match params.user_id {
        Some(user_id) => {
            sqlx::query_as::<_, PreferencesRow>("SELECT * FROM preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&state.db)
                .await?
        }
        None => None,
    };

    let job_types: Vec<String> = prefs
        .as_ref()
        .map(|p| p.job_types.clone())
        .unwrap_or_default();

    let jobs = if job_types.is_empty() {
        sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE status = 'active' ORDER BY posted_at DESC LIMIT 100",
        )
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'active' AND job_type::text = ANY($1)
            ORDER BY posted_at DESC LIMIT 100
            "#,
        )
        .bind(&job_types)
        .fetch_all(&state.db)
        .await?
    };

    let locations: Vec<String> = prefs.map(|p| p.locations).unwrap_or_default();
    let jobs = filter_by_locations(jobs, &locations);

    Ok(Json(JobSearchResponse { jobs }))
}

/// GET /api/v1/jobs/matches
///
/// Lists the user's cached matches, best first, optionally filtered by a
/// minimum score. Unscored placeholders never pass a min_score filter.
pub async fn handle_list_matches(
    State(state): State<AppState>,
    Query(params): Query<MatchListQuery>,
) -> Result<Json<MatchListResponse>, AppError> {
    let matches = list_matches(&state.db, &state.redis, params.user_id, params.min_score).await?;
    Ok(Json(MatchListResponse { matches }))
}

/// POST /api/v1/jobs/:id/favorite
pub async fn handle_toggle_favorite(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<UserIdBody>,
) -> Result<Json<MatchFlagResponse>, AppError> {
    ensure_job_exists(&state, job_id).await?;
    let entry = toggle_favorite(&state.db, req.user_id, job_id).await?;
    invalidate_listing(&state.redis, req.user_id).await;

    Ok(Json(flag_response(entry)))
}

/// POST /api/v1/jobs/:id/hide
pub async fn handle_toggle_hidden(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<UserIdBody>,
) -> Result<Json<MatchFlagResponse>, AppError> {
    ensure_job_exists(&state, job_id).await?;
    let entry = toggle_hidden(&state.db, req.user_id, job_id).await?;
    invalidate_listing(&state.redis, req.user_id).await;

    Ok(Json(flag_response(entry)))
}

/// Shapes a cache row into the toggle response. An unscored placeholder
/// reports a `null` score; a placeholder is never presented as a score of 0.
fn flag_response(entry: MatchCacheEntryRow) -> MatchFlagResponse {
    MatchFlagResponse {
        job_id: entry.job_id,
        match_score: MatchScore::from(entry.match_score),
        is_favorite: entry.is_favorite,
        is_hidden: entry.is_hidden,
    }
}

/// POST /api/v1/jobs/matches/recompute
///
/// Runs a full scoring pass for the user against all active jobs. Batched
/// five at a time with a pause between groups, so large job sets take a
/// while; this endpoint is the stand-in for the out-of-scope scheduler.
pub async fn handle_recompute_matches(
    State(state): State<AppState>,
    Json(req): Json<UserIdBody>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let jobs_scored = recompute_matches(
        &state.db,
        &state.redis,
        state.scorer.as_ref(),
        req.user_id,
    )
    .await?;

    Ok(Json(RecomputeResponse { jobs_scored }))
}

async fn ensure_job_exists(state: &AppState, job_id: Uuid) -> Result<(), AppError> {
    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(&state.db)
        .await?;
    exists
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))
}

/// Keeps jobs whose location matches any preferred location (case-folded
/// substring either direction). Remote jobs match a "remote" preference.
fn filter_by_locations(jobs: Vec<JobRow>, locations: &[String]) -> Vec<JobRow> {
    if locations.is_empty() {
        return jobs;
    }

    let wanted: Vec<String> = locations.iter().map(|l| l.to_lowercase()).collect();

    jobs.into_iter()
        .filter(|job| {
            let job_location = job.location.as_deref().unwrap_or("").to_lowercase();
            wanted.iter().any(|w| {
                (!job_location.is_empty()
                    && (job_location.contains(w.as_str()) || w.contains(job_location.as_str())))
                    || (w == "remote"
                        && job.location_type == crate::models::job::LocationType::Remote)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{ExperienceLevel, JobStatus, JobType, LocationType};
    use chrono::Utc;

    fn job(location: Option<&str>, location_type: LocationType) -> JobRow {
        JobRow {
            id: Uuid::new_v4(),
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            description: String::new(),
            skills_required: vec![],
            salary_min: None,
            salary_max: None,
            experience_level: ExperienceLevel::Mid,
            location: location.map(String::from),
            location_type,
            job_type: JobType::FullTime,
            status: JobStatus::Active,
            application_count: 0,
            posted_at: Utc::now(),
        }
    }

    #[test]
    fn test_location_filter_matches_substrings() {
        let jobs = vec![
            job(Some("Berlin, Germany"), LocationType::Onsite),
            job(Some("Paris"), LocationType::Onsite),
        ];
        let kept = filter_by_locations(jobs, &["berlin".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].location.as_deref(), Some("Berlin, Germany"));
    }

    #[test]
    fn test_remote_preference_matches_remote_jobs_without_location() {
        let jobs = vec![
            job(None, LocationType::Remote),
            job(Some("Paris"), LocationType::Onsite),
        ];
        let kept = filter_by_locations(jobs, &["Remote".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].location_type, LocationType::Remote);
    }

    #[test]
    fn test_empty_preference_list_keeps_all_jobs() {
        let jobs = vec![job(None, LocationType::Onsite), job(None, LocationType::Hybrid)];
        assert_eq!(filter_by_locations(jobs, &[]).len(), 2);
    }

    fn placeholder_entry(is_favorite: bool) -> MatchCacheEntryRow {
        MatchCacheEntryRow {
            user_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            match_score: None,
            match_details: serde_json::json!({}),
            match_reasons: vec![],
            is_favorite,
            is_hidden: false,
            calculated_at: None,
        }
    }

    #[test]
    fn test_unscored_placeholder_reports_null_score_not_zero() {
        // A favorite/hide before any scoring pass must never surface as a
        // real score of 0.
        let response = flag_response(placeholder_entry(true));
        assert_eq!(response.match_score, MatchScore::Unscored);

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["match_score"], serde_json::Value::Null);
        assert_eq!(body["is_favorite"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_favorite_toggled_back_off_stays_unscored() {
        // After an on-then-off toggle pair the row is back to not-favorite;
        // the score field must still read as unscored, not 0.
        let response = flag_response(placeholder_entry(false));
        assert!(!response.is_favorite);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["match_score"], serde_json::Value::Null);
        assert_ne!(body["match_score"], serde_json::json!(0));
    }
}
