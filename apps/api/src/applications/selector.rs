//! Auto-Apply Selector — converts high-scoring cached matches into
//! application records under a per-day quota.
//!
//! The select → exclude → create sequence runs inside one transaction, and
//! each insert uses ON CONFLICT DO NOTHING so a concurrent direct apply for
//! the same job skips that candidate instead of aborting the batch.

use std::collections::HashSet;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::{is_unique_violation, AppError};
use crate::matching::cache::{invalidate_listing, upsert_score};
use crate::matching::scorer::MatchScorer;
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::models::job::{JobRow, JobStatus};
use crate::models::matching::MatchedJobRow;
use crate::models::preferences::PreferencesRow;
use crate::models::profile::ProfileRow;

#[derive(Debug, Serialize)]
pub struct AutoApplyJobSummary {
    pub job_id: Uuid,
    pub title: String,
    pub company: String,
    pub match_score: i32,
}

#[derive(Debug, Serialize)]
pub struct AutoApplyOutcome {
    pub applications_created: usize,
    pub jobs: Vec<AutoApplyJobSummary>,
    /// Candidates that lost a race with a concurrent application. Reported
    /// as a soft warning; the batch still completes.
    pub skipped_duplicates: Vec<Uuid>,
}

/// Runs one auto-apply pass for the user.
///
/// Fails with `AutoApplyDisabled` when preferences are missing or opted out,
/// and `RateLimitExceeded` once today's auto-applied count reaches the cap.
/// The daily count is derived from application rows (UTC calendar day), not
/// stored separately, so it is always consistent with committed data.
pub async fn auto_apply(pool: &PgPool, user_id: Uuid) -> Result<AutoApplyOutcome, AppError> {
    let prefs =
        sqlx::query_as::<_, PreferencesRow>("SELECT * FROM preferences WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    let prefs = require_auto_apply_enabled(prefs)?;

    let day_start = utc_day_start(Utc::now());
    let today_count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM applications
        WHERE user_id = $1 AND is_auto_applied AND created_at >= $2
        "#,
    )
    .bind(user_id)
    .bind(day_start)
    .fetch_one(pool)
    .await?;

    let remaining = check_daily_quota(prefs.auto_apply_max_per_day, today_count)?;

    let mut tx = pool.begin().await?;

    let candidates = sqlx::query_as::<_, MatchedJobRow>(
        r#"
        SELECT j.id AS job_id, j.title, j.company, j.location, j.location_type,
               m.match_score, m.match_reasons, m.is_favorite, m.calculated_at
        FROM match_cache m
        JOIN jobs j ON j.id = m.job_id
        WHERE m.user_id = $1
          AND m.match_score IS NOT NULL
          AND m.match_score >= $2
          AND NOT m.is_hidden
          AND j.status = 'active'
        ORDER BY m.match_score DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(prefs.auto_apply_threshold)
    .bind(i64::from(remaining))
    .fetch_all(&mut *tx)
    .await?;

    let applied: Vec<Uuid> =
        sqlx::query_scalar("SELECT job_id FROM applications WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;
    let applied: HashSet<Uuid> = applied.into_iter().collect();

    let mut jobs = Vec::new();
    let mut skipped_duplicates = Vec::new();

    for candidate in exclude_applied(candidates, &applied) {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO applications
                (user_id, job_id, status, match_score, match_reasons, is_auto_applied)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT (user_id, job_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(candidate.job_id)
        .bind(ApplicationStatus::Pending)
        .bind(candidate.match_score)
        .bind(&candidate.match_reasons)
        .fetch_optional(&mut *tx)
        .await?;

        let job_id = candidate.job_id;
        let created =
            record_insert_outcome(inserted, candidate, &mut jobs, &mut skipped_duplicates);
        if !created {
            continue;
        }

        sqlx::query("UPDATE jobs SET application_count = application_count + 1 WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    info!(
        %user_id,
        created = jobs.len(),
        skipped = skipped_duplicates.len(),
        "Auto-apply pass finished"
    );

    Ok(AutoApplyOutcome {
        applications_created: jobs.len(),
        jobs,
        skipped_duplicates,
    })
}

/// Creates one application from direct user action: scores the pair (with
/// the mandatory fallback), refreshes the cache, then inserts. A duplicate
/// surfaces as a 409 conflict rather than being skipped.
pub async fn direct_apply(
    pool: &PgPool,
    redis: &redis::Client,
    scorer: &dyn MatchScorer,
    user_id: Uuid,
    job_id: Uuid,
) -> Result<ApplicationRow, AppError> {
    let profile = sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile for user {user_id} not found")))?;

    let job = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    if job.status != JobStatus::Active {
        return Err(AppError::Validation("Job is no longer active".to_string()));
    }

    let result = scorer.score(&profile, &job).await;
    upsert_score(pool, user_id, job_id, &result).await?;
    invalidate_listing(redis, user_id).await;

    // Insert and counter bump commit together, same as the batch path.
    let mut tx = pool.begin().await?;

    let application = sqlx::query_as::<_, ApplicationRow>(
        r#"
        INSERT INTO applications
            (user_id, job_id, status, match_score, match_reasons, is_auto_applied)
        VALUES ($1, $2, $3, $4, $5, FALSE)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(job_id)
    .bind(ApplicationStatus::Pending)
    .bind(result.score)
    .bind(&result.reasons)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateApplication
        } else {
            AppError::Database(e)
        }
    })?;

    sqlx::query("UPDATE jobs SET application_count = application_count + 1 WHERE id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(application)
}

/// First precondition: preferences must exist and opt in. Checked before
/// any cache read, so cache contents can never mask a disabled user.
fn require_auto_apply_enabled(
    prefs: Option<PreferencesRow>,
) -> Result<PreferencesRow, AppError> {
    match prefs {
        Some(p) if p.auto_apply_enabled => Ok(p),
        _ => Err(AppError::AutoApplyDisabled),
    }
}

/// Second precondition: the derived daily count must leave headroom.
/// Returns the remaining quota, guaranteed positive.
fn check_daily_quota(max_per_day: i32, today_count: i64) -> Result<i32, AppError> {
    let remaining = remaining_quota(max_per_day, today_count);
    if remaining == 0 {
        return Err(AppError::RateLimitExceeded {
            limit: max_per_day,
        });
    }
    Ok(remaining)
}

/// Folds one insert attempt into the outcome. A `None` id means the row lost
/// a race with a concurrent application for the same job: it is recorded as
/// a soft skip, never an abort. Returns true when an application was created.
fn record_insert_outcome(
    inserted: Option<Uuid>,
    candidate: MatchedJobRow,
    jobs: &mut Vec<AutoApplyJobSummary>,
    skipped_duplicates: &mut Vec<Uuid>,
) -> bool {
    if inserted.is_none() {
        skipped_duplicates.push(candidate.job_id);
        return false;
    }

    jobs.push(AutoApplyJobSummary {
        job_id: candidate.job_id,
        title: candidate.title,
        company: candidate.company,
        // Guarded non-NULL by the candidate query.
        match_score: candidate.match_score.unwrap_or(0),
    });
    true
}

/// Floors a timestamp to the start of its UTC calendar day. Auto-apply
/// quotas reset at UTC midnight.
fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn remaining_quota(max_per_day: i32, today_count: i64) -> i32 {
    (i64::from(max_per_day) - today_count).max(0) as i32
}

/// Set-difference by job id, preserving score-descending candidate order.
fn exclude_applied(
    candidates: Vec<MatchedJobRow>,
    applied: &HashSet<Uuid>,
) -> Vec<MatchedJobRow> {
    candidates
        .into_iter()
        .filter(|c| !applied.contains(&c.job_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::LocationType;
    use chrono::TimeZone;

    fn candidate(job_id: Uuid, score: i32) -> MatchedJobRow {
        MatchedJobRow {
            job_id,
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            location: None,
            location_type: LocationType::Remote,
            match_score: Some(score),
            match_reasons: vec!["Strong skills overlap".to_string()],
            is_favorite: false,
            calculated_at: None,
        }
    }

    #[test]
    fn test_utc_day_start_floors_to_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 17, 42, 9).unwrap();
        let start = utc_day_start(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_remaining_quota_never_negative() {
        assert_eq!(remaining_quota(10, 3), 7);
        assert_eq!(remaining_quota(10, 10), 0);
        // A long-running request spanning midnight can over-count; the quota
        // still floors at zero.
        assert_eq!(remaining_quota(10, 14), 0);
    }

    #[test]
    fn test_exclude_applied_preserves_order() {
        let keep_a = Uuid::new_v4();
        let drop_b = Uuid::new_v4();
        let keep_c = Uuid::new_v4();
        let candidates = vec![candidate(keep_a, 95), candidate(drop_b, 90), candidate(keep_c, 85)];
        let applied: HashSet<Uuid> = [drop_b].into_iter().collect();

        let survivors = exclude_applied(candidates, &applied);
        let ids: Vec<Uuid> = survivors.iter().map(|c| c.job_id).collect();
        assert_eq!(ids, vec![keep_a, keep_c]);
    }

    #[test]
    fn test_exclude_applied_with_empty_set_keeps_all() {
        let candidates = vec![candidate(Uuid::new_v4(), 80)];
        let survivors = exclude_applied(candidates, &HashSet::new());
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn test_missing_preferences_disable_auto_apply() {
        let err = require_auto_apply_enabled(None).unwrap_err();
        assert!(matches!(err, AppError::AutoApplyDisabled));
    }

    #[test]
    fn test_opted_out_preferences_disable_auto_apply() {
        // Disabled fails regardless of anything else in the preferences.
        let prefs = PreferencesRow::default_for(Uuid::new_v4());
        assert!(!prefs.auto_apply_enabled);
        let err = require_auto_apply_enabled(Some(prefs)).unwrap_err();
        assert!(matches!(err, AppError::AutoApplyDisabled));

        let mut enabled = PreferencesRow::default_for(Uuid::new_v4());
        enabled.auto_apply_enabled = true;
        assert!(require_auto_apply_enabled(Some(enabled)).is_ok());
    }

    #[test]
    fn test_exhausted_quota_is_rate_limited() {
        let err = check_daily_quota(10, 10).unwrap_err();
        assert!(matches!(err, AppError::RateLimitExceeded { limit: 10 }));
        // Over-count past midnight still rate-limits rather than underflowing.
        assert!(check_daily_quota(10, 14).is_err());
        assert_eq!(check_daily_quota(10, 3).unwrap(), 7);
    }

    #[test]
    fn test_duplicate_insert_is_skipped_not_fatal() {
        let mut jobs = Vec::new();
        let mut skipped = Vec::new();
        let lost_race = candidate(Uuid::new_v4(), 91);
        let lost_id = lost_race.job_id;

        let created = record_insert_outcome(None, lost_race, &mut jobs, &mut skipped);
        assert!(!created);
        assert!(jobs.is_empty());
        assert_eq!(skipped, vec![lost_id]);
    }

    #[test]
    fn test_created_insert_copies_cached_score_into_summary() {
        let mut jobs = Vec::new();
        let mut skipped = Vec::new();
        let won = candidate(Uuid::new_v4(), 85);
        let won_id = won.job_id;

        let created =
            record_insert_outcome(Some(Uuid::new_v4()), won, &mut jobs, &mut skipped);
        assert!(created);
        assert!(skipped.is_empty());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, won_id);
        assert_eq!(jobs[0].match_score, 85);
        assert_eq!(jobs[0].company, "Acme");
    }
}
