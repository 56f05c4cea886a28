mod catalog;
mod companies;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod scraping;
mod state;
#[cfg(test)]
mod testing;
mod tracking;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::PgCatalogStore;
use crate::companies::PgCompanyDirectory;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::routes::build_router;
use crate::scraping::fetcher::HttpFetcher;
use crate::scraping::reconciler::Reconciler;
use crate::scraping::scheduler::ScrapeScheduler;
use crate::state::AppState;
use crate::tracking::{PgTrackingStore, TrackingStateMachine};

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

    info!("Starting jobwatch v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.database_max_connections).await?;
    run_migrations(&db).await?;

    let catalog = Arc::new(PgCatalogStore::new(db.clone()));
    let companies = Arc::new(PgCompanyDirectory::new(db.clone()));
    let tracking = Arc::new(TrackingStateMachine::new(Arc::new(PgTrackingStore::new(db))));

    let fetcher = HttpFetcher::new(
        Duration::from_secs(config.fetch_timeout_secs),
        config.fetch_max_attempts,
        Duration::from_millis(config.fetch_backoff_ms),
    )
    .context("Failed to build HTTP client for careers pages")?;
    info!(
        "Fetcher initialized (timeout {}s, {} attempts)",
        config.fetch_timeout_secs, config.fetch_max_attempts
    );

    let reconciler = Arc::new(Reconciler::new(
        catalog.clone(),
        companies.clone(),
        Arc::new(fetcher),
    ));

    if config.scrape_interval_secs > 0 {
        ScrapeScheduler::new(
            reconciler.clone(),
            companies,
            config.scrape_concurrency,
            Duration::from_secs(config.scrape_cycle_timeout_secs),
        )
        .spawn(Duration::from_secs(config.scrape_interval_secs));
    } else {
        info!("Scheduled scraping disabled (SCRAPE_INTERVAL_SECS=0)");
    }

    // Build app state
    let state = AppState {
        catalog,
        tracking,
        reconciler,
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
