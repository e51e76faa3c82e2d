mod config;
mod db;
mod drafts;
mod errors;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::drafts::memory::MemoryDraftStore;
use crate::drafts::store::{DraftStore, PgDraftStore};
use crate::drafts::DraftService;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting drafts API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    let state = AppState {
        drafts: DraftService::new(store),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Selects the draft store backend named in the config.
async fn build_store(config: &Config) -> Result<Arc<dyn DraftStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres store"))?;
            let pool = create_pool(url, config.db_max_connections).await?;
            info!(
                "Using Postgres draft store (append retries: {})",
                config.append_max_retries
            );
            Ok(Arc::new(PgDraftStore::new(pool, config.append_max_retries)))
        }
        StoreBackend::Memory => {
            info!("Using in-memory draft store; data is lost on restart");
            Ok(Arc::new(MemoryDraftStore::new()))
        }
    }
}
