use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_AUTO_APPLY_THRESHOLD: i32 = 50;
pub const DEFAULT_AUTO_APPLY_MAX_PER_DAY: i32 = 10;

/// Per-user preferences singleton. The auto-apply fields gate the selector;
/// the filter lists are consumed by job search only, never by the scorer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PreferencesRow {
    pub user_id: Uuid,
    pub auto_apply_enabled: bool,
    pub auto_apply_threshold: i32,
    pub auto_apply_max_per_day: i32,
    pub job_types: Vec<String>,
    pub locations: Vec<String>,
    pub company_sizes: Vec<String>,
    pub industries: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl PreferencesRow {
    /// Defaults for a user who has never saved preferences: auto-apply off,
    /// threshold 50, ten applications per day, no filters.
    pub fn default_for(user_id: Uuid) -> Self {
        PreferencesRow {
            user_id,
            auto_apply_enabled: false,
            auto_apply_threshold: DEFAULT_AUTO_APPLY_THRESHOLD,
            auto_apply_max_per_day: DEFAULT_AUTO_APPLY_MAX_PER_DAY,
            job_types: vec![],
            locations: vec![],
            company_sizes: vec![],
            industries: vec![],
            updated_at: Utc::now(),
        }
    }
}
