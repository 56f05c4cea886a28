//! Job catalog persistence.
//!
//! `CatalogStore` is the seam the reconciler and the HTTP handlers talk to.
//! `PgCatalogStore` is the production backend; tests use an in-memory one.

pub mod handlers;
pub mod pg_store;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::job::{JobCandidate, JobRecord, JobUpdate};

pub use pg_store::PgCatalogStore;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("job '{external_id}' already exists for company {company_id}")]
    Conflict { company_id: Uuid, external_id: String },

    #[error("company {0} does not exist")]
    UnknownCompany(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Filters accepted by `CatalogStore::list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub company_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<JobRecord>,
    pub total: i64,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_natural_key(
        &self,
        company_id: Uuid,
        external_id: &str,
    ) -> Result<Option<JobRecord>, CatalogError>;

    /// Every known `external_id → id` for a company, active or not.
    async fn natural_keys(&self, company_id: Uuid) -> Result<HashMap<String, Uuid>, CatalogError>;

    /// Fails with `CatalogError::Conflict` if the natural key is taken.
    async fn insert(&self, candidate: &JobCandidate) -> Result<JobRecord, CatalogError>;

    /// Returns `None` if `id` no longer exists.
    async fn update_fields(
        &self,
        id: Uuid,
        update: &JobUpdate,
    ) -> Result<Option<JobRecord>, CatalogError>;

    /// Applies a batch of updates, returning the ids that were actually written.
    async fn update_many(&self, updates: &[(Uuid, JobUpdate)]) -> Result<Vec<Uuid>, CatalogError> {
        let mut written = Vec::with_capacity(updates.len());
        for (id, update) in updates {
            if self.update_fields(*id, update).await?.is_some() {
                written.push(*id);
            }
        }
        Ok(written)
    }

    /// Marks every active job of `company_id` whose external id is not in
    /// `observed` as inactive. `observed` must be a complete snapshot.
    async fn deactivate_missing(
        &self,
        company_id: Uuid,
        observed: &HashSet<String>,
    ) -> Result<u64, CatalogError>;

    async fn get(&self, id: Uuid) -> Result<Option<JobRecord>, CatalogError>;

    async fn list(&self, filter: &JobFilter) -> Result<JobPage, CatalogError>;
}
