pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::catalog::handlers as jobs;
use crate::scraping::handlers as scraping;
use crate::state::AppState;
use crate::tracking::handlers as tracking;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Job catalog
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route("/api/v1/jobs/:id", get(jobs::handle_get_job))
        // Application tracking
        .route(
            "/api/v1/tracking",
            get(tracking::handle_list_tracking).post(tracking::handle_create_tracking),
        )
        .route(
            "/api/v1/tracking/:job_id",
            put(tracking::handle_update_tracking),
        )
        // Scraping
        .route(
            "/api/v1/companies/:id/scrape",
            post(scraping::handle_scrape_company),
        )
        .with_state(state)
}
