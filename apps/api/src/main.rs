mod chat;
mod config;
mod db;
mod directory;
mod errors;
mod identity;
mod matching;
mod models;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::chat::hub::ConversationHub;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::matching::scoring::WeightedSkillScorer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::postgres::spawn_notification_relay;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Match API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&db).await?;
    let store = Arc::new(PgStore::new(db.clone()));

    // Live delivery: local hub, fed by other replicas through LISTEN/NOTIFY
    let hub = Arc::new(ConversationHub::new(config.subscription_buffer));
    spawn_notification_relay(&db, Arc::clone(&hub)).await?;

    let state = AppState {
        directory: store.clone(),
        chat: store,
        hub,
        scorer: Arc::new(WeightedSkillScorer),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
