use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::models::tracking::{ApplicationStatus, TrackingRecord};
use crate::tracking::{NewTracking, TrackingError, TrackingStore};

/// Applies a status change to a record.
///
/// `applied_at` is stamped with `now` only when entering `Applied` from a
/// different status. Re-entering `Applied` later stamps it again. Notes are
/// replaced, never merged.
pub fn next_state(
    current: &TrackingRecord,
    new_status: ApplicationStatus,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> TrackingRecord {
    let mut next = current.clone();
    if new_status == ApplicationStatus::Applied && current.status != ApplicationStatus::Applied {
        next.applied_at = Some(now);
    }
    next.status = new_status;
    next.notes = notes;
    next.updated_at = now;
    next
}

pub struct TrackingStateMachine {
    store: Arc<dyn TrackingStore>,
}

impl TrackingStateMachine {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        status: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<TrackingRecord, TrackingError> {
        self.create_at(user_id, job_id, status, notes, Utc::now()).await
    }

    pub async fn create_at(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        status: ApplicationStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TrackingRecord, TrackingError> {
        // No previous status, so starting out as applied counts as entering it.
        let applied_at = (status == ApplicationStatus::Applied).then_some(now);
        let record = self
            .store
            .insert(NewTracking {
                user_id,
                job_id,
                status,
                notes,
                applied_at,
                at: now,
            })
            .await?;
        info!("User {user_id} started tracking job {job_id} as {status}");
        Ok(record)
    }

    /// `None` when the user does not track `job_id`.
    pub async fn transition(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        new_status: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<Option<TrackingRecord>, TrackingError> {
        self.transition_at(user_id, job_id, new_status, notes, Utc::now())
            .await
    }

    pub async fn transition_at(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        new_status: ApplicationStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<TrackingRecord>, TrackingError> {
        let step = move |current: &TrackingRecord| next_state(current, new_status, notes.clone(), now);
        let updated = self.store.update_with(user_id, job_id, &step).await?;
        if let Some(record) = &updated {
            info!("User {user_id} moved job {job_id} to {}", record.status);
        }
        Ok(updated)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TrackingRecord>, TrackingError> {
        self.store.list_for_user(user_id).await
    }
}
