mod clock;
mod config;
mod db;
mod eco;
mod errors;
mod models;
mod routes;
mod state;
mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::clock::SystemClock;
use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::eco::achievements::default_catalogue;
use crate::eco::gamification::GamificationEngine;
use crate::eco::locks::UserLocks;
use crate::eco::notifier::{BadgeNotifier, NoopNotifier, RedisBadgeNotifier};
use crate::eco::rollup::spawn_rollup_task;
use crate::eco::rules::GamificationRules;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;
use crate::store::{AchievementStore, BatchSource, ScoreStore};

type Backend = (
    Arc<dyn ScoreStore>,
    Arc<dyn BatchSource>,
    Arc<dyn AchievementStore>,
);

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

    info!("Starting EcoScore v{}", env!("CARGO_PKG_VERSION"));

    let (store, batches, achievements) = build_backend(&config).await?;

    let notifier: Arc<dyn BadgeNotifier> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis badge notifier initialized");
            Arc::new(RedisBadgeNotifier::new(client))
        }
        None => {
            info!("REDIS_URL not set, badge notifications disabled");
            Arc::new(NoopNotifier)
        }
    };

    let engine = GamificationEngine::new(GamificationRules::default())?;

    let seeded = achievements.seed(&default_catalogue(Utc::now())).await?;
    info!("Achievement catalogue ready ({seeded} new definitions)");

    let state = AppState {
        store,
        batches,
        achievements,
        notifier,
        clock: Arc::new(SystemClock),
        engine: Arc::new(engine),
        locks: UserLocks::new(),
        config: config.clone(),
    };

    if config.rollup_interval_secs > 0 {
        spawn_rollup_task(state.clone(), Duration::from_secs(config.rollup_interval_secs));
        info!("Eco history rollup every {}s", config.rollup_interval_secs);
    }

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

/// One backend serves every store seam.
async fn build_backend(config: &Config) -> Result<Backend> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let store = Arc::new(PgStore::new(create_pool(url).await?));
            let backend: Backend = (store.clone(), store.clone(), store);
            Ok(backend)
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            let backend: Backend = (store.clone(), store.clone(), store);
            Ok(backend)
        }
    }
}
