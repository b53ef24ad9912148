//! Match Cache maintenance — the persisted (user, job) score table plus a
//! Redis read-through for the listing endpoint.
//!
//! Favorite/hide before any scoring pass creates a placeholder row with a
//! NULL score; callers see `MatchScore::Unscored`, never a fabricated 0.
//! Redis failures degrade to a cache miss and are logged, never surfaced.

use redis::AsyncCommands;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::scorer::{score_batch, MatchResult, MatchScorer};
use crate::models::matching::{MatchCacheEntryRow, MatchedJobRow};
use crate::models::profile::ProfileRow;

const MATCHES_TTL_SECS: u64 = 300;

fn matches_cache_key(user_id: Uuid) -> String {
    format!("matches:{user_id}")
}

// ────────────────────────────────────────────────────────────────────────────
// Score upsert
// ────────────────────────────────────────────────────────────────────────────

/// Idempotent create-or-update of the cached score for one (user, job) pair.
/// Preserves the user's favorite/hidden flags; stores the original reasons
/// list so downstream consumers never have to re-derive it from detail keys.
pub async fn upsert_score(
    pool: &PgPool,
    user_id: Uuid,
    job_id: Uuid,
    result: &MatchResult,
) -> Result<(), sqlx::Error> {
    let details = serde_json::to_value(&result.details).unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO match_cache
            (user_id, job_id, match_score, match_details, match_reasons, calculated_at)
        VALUES ($1, $2, $3, $4, $5, now())
        ON CONFLICT (user_id, job_id)
        DO UPDATE SET
            match_score = EXCLUDED.match_score,
            match_details = EXCLUDED.match_details,
            match_reasons = EXCLUDED.match_reasons,
            calculated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(job_id)
    .bind(result.score)
    .bind(details)
    .bind(&result.reasons)
    .execute(pool)
    .await?;

    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// User flags
// ────────────────────────────────────────────────────────────────────────────

/// Flips the favorite flag, creating an unscored placeholder if needed.
pub async fn toggle_favorite(
    pool: &PgPool,
    user_id: Uuid,
    job_id: Uuid,
) -> Result<MatchCacheEntryRow, sqlx::Error> {
    sqlx::query_as::<_, MatchCacheEntryRow>(
        r#"
        INSERT INTO match_cache (user_id, job_id, is_favorite)
        VALUES ($1, $2, TRUE)
        ON CONFLICT (user_id, job_id)
        DO UPDATE SET is_favorite = NOT match_cache.is_favorite
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(job_id)
    .fetch_one(pool)
    .await
}

/// Flips the hidden flag, creating an unscored placeholder if needed.
/// A hidden entry is excluded from listings and from auto-apply selection.
pub async fn toggle_hidden(
    pool: &PgPool,
    user_id: Uuid,
    job_id: Uuid,
) -> Result<MatchCacheEntryRow, sqlx::Error> {
    sqlx::query_as::<_, MatchCacheEntryRow>(
        r#"
        INSERT INTO match_cache (user_id, job_id, is_hidden)
        VALUES ($1, $2, TRUE)
        ON CONFLICT (user_id, job_id)
        DO UPDATE SET is_hidden = NOT match_cache.is_hidden
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(job_id)
    .fetch_one(pool)
    .await
}

// ────────────────────────────────────────────────────────────────────────────
// Listing with Redis read-through
// ────────────────────────────────────────────────────────────────────────────

/// Returns the user's non-hidden matches against active jobs, best first,
/// with unscored placeholders sorting last. `min_score` filters in Rust so
/// one cached listing serves every threshold.
pub async fn list_matches(
    pool: &PgPool,
    redis: &redis::Client,
    user_id: Uuid,
    min_score: Option<i32>,
) -> Result<Vec<MatchedJobRow>, AppError> {
    if let Some(cached) = read_cached_listing(redis, user_id).await {
        return Ok(filter_min_score(cached, min_score));
    }

    let rows = sqlx::query_as::<_, MatchedJobRow>(
        r#"
        SELECT j.id AS job_id, j.title, j.company, j.location, j.location_type,
               m.match_score, m.match_reasons, m.is_favorite, m.calculated_at
        FROM match_cache m
        JOIN jobs j ON j.id = m.job_id
        WHERE m.user_id = $1
          AND NOT m.is_hidden
          AND j.status = 'active'
        ORDER BY m.match_score DESC NULLS LAST, m.calculated_at DESC NULLS LAST
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    write_cached_listing(redis, user_id, &rows).await;

    Ok(filter_min_score(rows, min_score))
}

fn filter_min_score(rows: Vec<MatchedJobRow>, min_score: Option<i32>) -> Vec<MatchedJobRow> {
    match min_score {
        Some(min) => rows.into_iter().filter(|r| r.score().meets(min)).collect(),
        None => rows,
    }
}

async fn read_cached_listing(redis: &redis::Client, user_id: Uuid) -> Option<Vec<MatchedJobRow>> {
    let mut conn = match redis.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(e) => {
            warn!("Redis unavailable, reading matches from Postgres: {e}");
            return None;
        }
    };

    match conn
        .get::<_, Option<String>>(matches_cache_key(user_id))
        .await
    {
        Ok(Some(payload)) => serde_json::from_str(&payload).ok(),
        Ok(None) => None,
        Err(e) => {
            warn!("Redis read failed, treating as miss: {e}");
            None
        }
    }
}

async fn write_cached_listing(redis: &redis::Client, user_id: Uuid, rows: &[MatchedJobRow]) {
    let Ok(payload) = serde_json::to_string(rows) else {
        return;
    };
    let Ok(mut conn) = redis.get_multiplexed_async_connection().await else {
        return;
    };
    if let Err(e) = conn
        .set_ex::<_, _, ()>(matches_cache_key(user_id), payload, MATCHES_TTL_SECS)
        .await
    {
        warn!("Redis write failed, listing stays uncached: {e}");
    }
}

/// Drops the cached listing after any write to the user's match rows.
pub async fn invalidate_listing(redis: &redis::Client, user_id: Uuid) {
    let Ok(mut conn) = redis.get_multiplexed_async_connection().await else {
        return;
    };
    if let Err(e) = conn.del::<_, ()>(matches_cache_key(user_id)).await {
        warn!("Redis invalidation failed: {e}");
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recompute pass
// ────────────────────────────────────────────────────────────────────────────

/// Scores every active job for one user and upserts the results. No
/// background scheduler exists in-scope, so this runs on demand.
pub async fn recompute_matches(
    pool: &PgPool,
    redis: &redis::Client,
    scorer: &dyn MatchScorer,
    user_id: Uuid,
) -> Result<usize, AppError> {
    let profile = sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile for user {user_id} not found")))?;

    let jobs = sqlx::query_as::<_, crate::models::job::JobRow>(
        "SELECT * FROM jobs WHERE status = 'active' ORDER BY posted_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let results = score_batch(scorer, &profile, &jobs).await;
    let scored = results.len();

    for (job_id, result) in results {
        upsert_score(pool, user_id, job_id, &result).await?;
    }

    invalidate_listing(redis, user_id).await;
    info!(%user_id, scored, "Match recompute pass finished");

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::LocationType;

    fn row(score: Option<i32>) -> MatchedJobRow {
        MatchedJobRow {
            job_id: Uuid::new_v4(),
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            location: None,
            location_type: LocationType::Remote,
            match_score: score,
            match_reasons: vec![],
            is_favorite: false,
            calculated_at: None,
        }
    }

    #[test]
    fn test_filter_min_score_drops_unscored_and_low_rows() {
        let rows = vec![row(Some(90)), row(Some(40)), row(None)];
        let filtered = filter_min_score(rows, Some(50));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].match_score, Some(90));
    }

    #[test]
    fn test_filter_without_min_keeps_everything() {
        let rows = vec![row(Some(10)), row(None)];
        assert_eq!(filter_min_score(rows, None).len(), 2);
    }

    #[test]
    fn test_cache_key_is_per_user() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(matches_cache_key(a), matches_cache_key(b));
        assert!(matches_cache_key(a).starts_with("matches:"));
    }
}
