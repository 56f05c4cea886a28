use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::tracking::{ApplicationStatus, TrackingRecord};
use crate::state::AppState;

const MAX_NOTES_LEN: usize = 10_000;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateTrackingRequest {
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTrackingRequest {
    pub user_id: Uuid,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct TrackingResponse {
    pub tracking: TrackingRecord,
}

#[derive(Serialize)]
pub struct TrackingListResponse {
    pub trackings: Vec<TrackingRecord>,
}

fn check_notes(notes: &Option<String>) -> Result<(), AppError> {
    match notes {
        Some(n) if n.chars().count() > MAX_NOTES_LEN => Err(AppError::Validation(format!(
            "notes must be at most {MAX_NOTES_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

/// GET /api/v1/tracking
pub async fn handle_list_tracking(
    State(state): State<AppState>,
    query: Result<Query<UserIdQuery>, QueryRejection>,
) -> Result<Json<TrackingListResponse>, AppError> {
    let Query(params) = query?;
    let trackings = state.tracking.list_for_user(params.user_id).await?;
    Ok(Json(TrackingListResponse { trackings }))
}

/// POST /api/v1/tracking
pub async fn handle_create_tracking(
    State(state): State<AppState>,
    payload: Result<Json<CreateTrackingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TrackingResponse>), AppError> {
    let Json(req) = payload?;
    check_notes(&req.notes)?;
    let tracking = state
        .tracking
        .create(req.user_id, req.job_id, req.status, req.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(TrackingResponse { tracking })))
}

/// PUT /api/v1/tracking/:job_id
pub async fn handle_update_tracking(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    payload: Result<Json<UpdateTrackingRequest>, JsonRejection>,
) -> Result<Json<TrackingResponse>, AppError> {
    let Json(req) = payload?;
    check_notes(&req.notes)?;
    let tracking = state
        .tracking
        .transition(req.user_id, job_id, req.status, req.notes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tracking for job {job_id} not found")))?;
    Ok(Json(TrackingResponse { tracking }))
}
