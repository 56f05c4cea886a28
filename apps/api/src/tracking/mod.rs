//! Per-user application tracking.
//!
//! `TrackingStateMachine` owns the status/timestamp rules; a `TrackingStore`
//! only persists what the machine computes.

pub mod handlers;
pub mod machine;
pub mod pg_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::tracking::{ApplicationStatus, TrackingRecord};

pub use machine::TrackingStateMachine;
pub use pg_store::PgTrackingStore;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("user {user_id} already tracks job {job_id}")]
    Conflict { user_id: Uuid, job_id: Uuid },

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A record about to be created.
#[derive(Debug, Clone)]
pub struct NewTracking {
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

/// Computes the next state of a record from its current one.
pub type TrackingStep<'a> = &'a (dyn Fn(&TrackingRecord) -> TrackingRecord + Send + Sync);

#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Fails with `Conflict` if the pair exists, `JobNotFound` if the job does not.
    async fn insert(&self, new: NewTracking) -> Result<TrackingRecord, TrackingError>;

    /// Atomically reads the pair's record, applies `step` and persists the
    /// result. `None` when the pair has no record.
    async fn update_with(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        step: TrackingStep<'_>,
    ) -> Result<Option<TrackingRecord>, TrackingError>;

    /// Most recently updated first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TrackingRecord>, TrackingError>;
}
