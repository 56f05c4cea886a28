use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::models::tracking::TrackingRecord;
use crate::tracking::{NewTracking, TrackingError, TrackingStep, TrackingStore};

const TRACKING_COLUMNS: &str =
    "id, user_id, job_id, status, notes, applied_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgTrackingStore {
    pool: PgPool,
}

impl PgTrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackingStore for PgTrackingStore {
    async fn insert(&self, new: NewTracking) -> Result<TrackingRecord, TrackingError> {
        let sql = format!(
            r#"
            INSERT INTO user_job_tracking
                (user_id, job_id, status, notes, applied_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {TRACKING_COLUMNS}
            "#
        );
        sqlx::query_as::<_, TrackingRecord>(&sql)
            .bind(new.user_id)
            .bind(new.job_id)
            .bind(new.status)
            .bind(&new.notes)
            .bind(new.applied_at)
            .bind(new.at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    TrackingError::Conflict {
                        user_id: new.user_id,
                        job_id: new.job_id,
                    }
                } else if is_foreign_key_violation(&e) {
                    TrackingError::JobNotFound(new.job_id)
                } else {
                    TrackingError::Database(e)
                }
            })
    }

    async fn update_with(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        step: TrackingStep<'_>,
    ) -> Result<Option<TrackingRecord>, TrackingError> {
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT {TRACKING_COLUMNS} FROM user_job_tracking WHERE user_id = $1 AND job_id = $2 FOR UPDATE"
        );
        let current: Option<TrackingRecord> = sqlx::query_as(&select)
            .bind(user_id)
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };
        let next = step(&current);

        let update = format!(
            r#"
            UPDATE user_job_tracking
            SET status = $2, notes = $3, applied_at = $4, updated_at = $5
            WHERE id = $1
            RETURNING {TRACKING_COLUMNS}
            "#
        );
        let saved: TrackingRecord = sqlx::query_as(&update)
            .bind(current.id)
            .bind(next.status)
            .bind(&next.notes)
            .bind(next.applied_at)
            .bind(next.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(saved))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TrackingRecord>, TrackingError> {
        let sql = format!(
            "SELECT {TRACKING_COLUMNS} FROM user_job_tracking WHERE user_id = $1 ORDER BY updated_at DESC"
        );
        Ok(sqlx::query_as::<_, TrackingRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }
}
