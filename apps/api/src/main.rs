mod applications;
mod config;
mod db;
mod errors;
mod llm_client;
mod matching;
mod models;
mod profiles;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::matching::scorer::{LlmMatchScorer, MatchScorer, RuleBasedScorer};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobAutoFlow API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize the match scorer. The AI scorer carries the rule-based
    // fallback internally; DISABLE_AI_SCORING skips the AI strategy entirely.
    let scorer: Arc<dyn MatchScorer> = if config.disable_ai_scoring {
        info!("AI scoring disabled, using rule-based scorer only");
        Arc::new(RuleBasedScorer)
    } else {
        let llm = LlmClient::new(config.anthropic_api_key.clone());
        info!("LLM client initialized (model: {})", llm_client::MODEL);
        Arc::new(LlmMatchScorer::new(llm))
    };

    // Build app state
    let state = AppState { db, redis, scorer };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
