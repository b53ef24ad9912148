use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::job::LocationType;

/// Tagged match score. `Unscored` means no scoring pass has run for the pair
/// yet — a favorite or hide before scoring creates a placeholder, and that
/// placeholder must not masquerade as a real score of 0.
///
/// Stored as a nullable column; serializes as JSON `null` / integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<i32>", into = "Option<i32>")]
pub enum MatchScore {
    Unscored,
    Scored(i32),
}

impl MatchScore {
    pub fn meets(self, threshold: i32) -> bool {
        matches!(self, MatchScore::Scored(s) if s >= threshold)
    }
}

impl From<Option<i32>> for MatchScore {
    fn from(value: Option<i32>) -> Self {
        match value {
            Some(s) => MatchScore::Scored(s),
            None => MatchScore::Unscored,
        }
    }
}

impl From<MatchScore> for Option<i32> {
    fn from(value: MatchScore) -> Self {
        match value {
            MatchScore::Scored(s) => Some(s),
            MatchScore::Unscored => None,
        }
    }
}

/// One persisted (user, job) match record plus the user's flags.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchCacheEntryRow {
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub match_score: Option<i32>,
    pub match_details: Value,
    pub match_reasons: Vec<String>,
    pub is_favorite: bool,
    pub is_hidden: bool,
    pub calculated_at: Option<DateTime<Utc>>,
}

/// Cache entry joined with its job, as returned by the matches listing and
/// consumed by the auto-apply selector.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchedJobRow {
    pub job_id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub location_type: LocationType,
    pub match_score: Option<i32>,
    pub match_reasons: Vec<String>,
    pub is_favorite: bool,
    pub calculated_at: Option<DateTime<Utc>>,
}

impl MatchedJobRow {
    pub fn score(&self) -> MatchScore {
        MatchScore::from(self.match_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_score_serializes_as_null_or_int() {
        assert_eq!(
            serde_json::to_string(&MatchScore::Unscored).unwrap(),
            "null"
        );
        assert_eq!(
            serde_json::to_string(&MatchScore::Scored(78)).unwrap(),
            "78"
        );
    }

    #[test]
    fn test_match_score_roundtrip_from_db() {
        assert_eq!(MatchScore::from(None), MatchScore::Unscored);
        assert_eq!(MatchScore::from(Some(0)), MatchScore::Scored(0));
        let back: Option<i32> = MatchScore::Scored(42).into();
        assert_eq!(back, Some(42));
    }

    #[test]
    fn test_unscored_never_meets_a_threshold() {
        assert!(!MatchScore::Unscored.meets(0));
        assert!(MatchScore::Scored(50).meets(50));
        assert!(!MatchScore::Scored(49).meets(50));
    }
}
