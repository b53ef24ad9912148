use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Applied,
    Viewed,
    Shortlisted,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
}

/// One application per (user, job) pair, enforced by a unique constraint.
/// `match_score` is a snapshot taken at creation time; later rescoring of the
/// match cache does not touch it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub status: ApplicationStatus,
    pub match_score: Option<i32>,
    pub match_reasons: Vec<String>,
    pub is_auto_applied: bool,
    pub created_at: DateTime<Utc>,
}
