use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::matching::scorer::MatchScorer;

/// Shared application state injected into all route handlers via Axum
/// extractors. Collaborators are explicit handles, not process singletons,
/// so tests can swap in fakes.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Backs the read-through cache on the matches listing.
    pub redis: RedisClient,
    /// Pluggable match scorer. Default: LlmMatchScorer with the rule-based
    /// fallback inside it. Swap to rules-only via DISABLE_AI_SCORING.
    pub scorer: Arc<dyn MatchScorer>,
}
