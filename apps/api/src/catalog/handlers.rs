use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{JobFilter, JobPage};
use crate::errors::AppError;
use crate::models::job::{JobCandidate, JobRecord};
use crate::state::AppState;

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Serialize)]
pub struct JobResponse {
    pub job: JobRecord,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub department: Option<String>,
    pub job_type: Option<String>,
    pub salary_range: Option<String>,
    pub job_url: String,
    pub external_id: String,
}

impl CreateJobRequest {
    fn into_candidate(self) -> Result<JobCandidate, AppError> {
        let required = |field: &str, value: String| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(AppError::Validation(format!("'{field}' must not be empty")))
            } else {
                Ok(value)
            }
        };
        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let job_url = required("job_url", self.job_url)?;
        url::Url::parse(&job_url)
            .map_err(|_| AppError::Validation(format!("'{job_url}' is not an absolute URL")))?;

        Ok(JobCandidate {
            company_id: self.company_id,
            title: required("title", self.title)?,
            description: optional(self.description),
            location: optional(self.location),
            department: optional(self.department),
            job_type: optional(self.job_type),
            salary_range: optional(self.salary_range),
            job_url,
            external_id: required("external_id", self.external_id)?,
        })
    }
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    query: Result<Query<JobFilter>, QueryRejection>,
) -> Result<Json<JobPage>, AppError> {
    let Query(filter) = query?;
    if let Some(limit) = filter.limit {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
    }
    if filter.offset.is_some_and(|o| o < 0) {
        return Err(AppError::Validation("offset must not be negative".to_string()));
    }
    Ok(Json(state.catalog.list(&filter).await?))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, AppError> {
    let job = state
        .catalog
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;
    Ok(Json(JobResponse { job }))
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<JobResponse>), AppError> {
    let Json(req) = payload?;
    let candidate = req.into_candidate()?;
    let job = state.catalog.insert(&candidate).await?;
    Ok((StatusCode::CREATED, Json(JobResponse { job })))
}
