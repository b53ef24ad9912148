pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::applications::handlers as application_handlers;
use crate::matching::handlers as matching_handlers;
use crate::profiles::handlers as profile_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs & matching
        .route("/api/v1/jobs", get(matching_handlers::handle_search_jobs))
        .route(
            "/api/v1/jobs/matches",
            get(matching_handlers::handle_list_matches),
        )
        .route(
            "/api/v1/jobs/matches/recompute",
            post(matching_handlers::handle_recompute_matches),
        )
        .route(
            "/api/v1/jobs/:id/favorite",
            post(matching_handlers::handle_toggle_favorite),
        )
        .route(
            "/api/v1/jobs/:id/hide",
            post(matching_handlers::handle_toggle_hidden),
        )
        // Applications
        .route(
            "/api/v1/applications",
            post(application_handlers::handle_apply)
                .get(application_handlers::handle_list_applications),
        )
        .route(
            "/api/v1/applications/auto-apply",
            post(application_handlers::handle_auto_apply),
        )
        // Profile & preferences
        .route(
            "/api/v1/profile",
            get(profile_handlers::handle_get_profile).put(profile_handlers::handle_upsert_profile),
        )
        .route(
            "/api/v1/preferences",
            get(profile_handlers::handle_get_preferences)
                .put(profile_handlers::handle_upsert_preferences),
        )
        .with_state(state)
}
