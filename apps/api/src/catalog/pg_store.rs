use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::catalog::{CatalogError, CatalogStore, JobFilter, JobPage};
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::models::job::{JobCandidate, JobRecord, JobUpdate};

const JOB_COLUMNS: &str = "id, company_id, title, description, location, department, job_type, \
     salary_range, job_url, external_id, is_active, created_at, updated_at";

/// Catalog backed by the `jobs` table.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_by_natural_key(
        &self,
        company_id: Uuid,
        external_id: &str,
    ) -> Result<Option<JobRecord>, CatalogError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE company_id = $1 AND external_id = $2");
        Ok(sqlx::query_as::<_, JobRecord>(&sql)
            .bind(company_id)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn natural_keys(&self, company_id: Uuid) -> Result<HashMap<String, Uuid>, CatalogError> {
        let rows: Vec<(String, Uuid)> =
            sqlx::query_as("SELECT external_id, id FROM jobs WHERE company_id = $1")
                .bind(company_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn insert(&self, candidate: &JobCandidate) -> Result<JobRecord, CatalogError> {
        let sql = format!(
            r#"
            INSERT INTO jobs
                (company_id, title, description, location, department, job_type,
                 salary_range, job_url, external_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {JOB_COLUMNS}
            "#
        );
        sqlx::query_as::<_, JobRecord>(&sql)
            .bind(candidate.company_id)
            .bind(&candidate.title)
            .bind(&candidate.description)
            .bind(&candidate.location)
            .bind(&candidate.department)
            .bind(&candidate.job_type)
            .bind(&candidate.salary_range)
            .bind(&candidate.job_url)
            .bind(&candidate.external_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CatalogError::Conflict {
                        company_id: candidate.company_id,
                        external_id: candidate.external_id.clone(),
                    }
                } else if is_foreign_key_violation(&e) {
                    CatalogError::UnknownCompany(candidate.company_id)
                } else {
                    CatalogError::Database(e)
                }
            })
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: &JobUpdate,
    ) -> Result<Option<JobRecord>, CatalogError> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET title = $2, description = $3, location = $4, department = $5,
                job_type = $6, salary_range = $7, job_url = $8, is_active = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, JobRecord>(&sql)
            .bind(id)
            .bind(&update.title)
            .bind(&update.description)
            .bind(&update.location)
            .bind(&update.department)
            .bind(&update.job_type)
            .bind(&update.salary_range)
            .bind(&update.job_url)
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// One round trip for the whole batch via `UNNEST`.
    async fn update_many(&self, updates: &[(Uuid, JobUpdate)]) -> Result<Vec<Uuid>, CatalogError> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(updates.len());
        let mut titles = Vec::with_capacity(updates.len());
        let mut descriptions = Vec::with_capacity(updates.len());
        let mut locations = Vec::with_capacity(updates.len());
        let mut departments = Vec::with_capacity(updates.len());
        let mut job_types = Vec::with_capacity(updates.len());
        let mut salary_ranges = Vec::with_capacity(updates.len());
        let mut job_urls = Vec::with_capacity(updates.len());
        let mut actives = Vec::with_capacity(updates.len());
        for (id, u) in updates {
            ids.push(*id);
            titles.push(u.title.clone());
            descriptions.push(u.description.clone());
            locations.push(u.location.clone());
            departments.push(u.department.clone());
            job_types.push(u.job_type.clone());
            salary_ranges.push(u.salary_range.clone());
            job_urls.push(u.job_url.clone());
            actives.push(u.is_active);
        }

        let written: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE jobs AS j
            SET title = u.title, description = u.description, location = u.location,
                department = u.department, job_type = u.job_type,
                salary_range = u.salary_range, job_url = u.job_url,
                is_active = u.is_active, updated_at = NOW()
            FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[],
                        $6::text[], $7::text[], $8::text[], $9::bool[])
                AS u(id, title, description, location, department, job_type,
                     salary_range, job_url, is_active)
            WHERE j.id = u.id
            RETURNING j.id
            "#,
        )
        .bind(&ids)
        .bind(&titles)
        .bind(&descriptions)
        .bind(&locations)
        .bind(&departments)
        .bind(&job_types)
        .bind(&salary_ranges)
        .bind(&job_urls)
        .bind(&actives)
        .fetch_all(&self.pool)
        .await?;

        debug!("Batch updated {} of {} jobs", written.len(), updates.len());
        Ok(written)
    }

    async fn deactivate_missing(
        &self,
        company_id: Uuid,
        observed: &HashSet<String>,
    ) -> Result<u64, CatalogError> {
        let observed: Vec<String> = observed.iter().cloned().collect();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET is_active = FALSE, updated_at = NOW()
            WHERE company_id = $1 AND is_active AND NOT (external_id = ANY($2))
            "#,
        )
        .bind(company_id)
        .bind(&observed)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobRecord>, CatalogError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        Ok(sqlx::query_as::<_, JobRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(&self, filter: &JobFilter) -> Result<JobPage, CatalogError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs WHERE 1=1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1=1"));
        push_filters(&mut select, filter);
        select.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            select.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = filter.offset {
            select.push(" OFFSET ").push_bind(offset);
        }
        let jobs = select
            .build_query_as::<JobRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(JobPage { jobs, total })
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
    if let Some(company_id) = filter.company_id {
        qb.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(is_active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
