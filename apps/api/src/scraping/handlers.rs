use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::scraping::reconciler::ReconcileReport;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ScrapeResponse {
    pub report: ReconcileReport,
}

/// POST /api/v1/companies/:id/scrape
pub async fn handle_scrape_company(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScrapeResponse>, AppError> {
    let report = state.reconciler.run(id).await?;
    Ok(Json(ScrapeResponse { report }))
}
