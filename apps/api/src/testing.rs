//! In-memory stand-ins for the Postgres stores and the HTTP fetcher.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::catalog::{CatalogError, CatalogStore, JobFilter, JobPage};
use crate::companies::CompanyDirectory;
use crate::models::company::Company;
use crate::models::job::{JobCandidate, JobRecord, JobUpdate};
use crate::models::tracking::TrackingRecord;
use crate::scraping::fetcher::{DocumentFetcher, FetchError};
use crate::scraping::rule::ScrapingRule;
use crate::tracking::{NewTracking, TrackingError, TrackingStep, TrackingStore};

/// Renders a careers page in the default rule's markup.
pub fn careers_page(jobs: &[(&str, &str)]) -> String {
    let items: String = jobs
        .iter()
        .map(|(id, title)| {
            format!(
                r#"<li class="job-listing" data-job-id="{id}"><a href="/jobs/{id}"><span class="title">{title}</span></a><span class="location">Remote</span></li>"#
            )
        })
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

// ────────────────────────────────────────────────────────────────────────────
// Catalog
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCatalogStore {
    jobs: Mutex<Vec<JobRecord>>,
    insert_delay: Mutex<Option<Duration>>,
}

impl InMemoryCatalogStore {
    /// Every later insert sleeps for `delay` before writing.
    pub fn slow_inserts(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }

    pub fn all(&self) -> Vec<JobRecord> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn by_external_id(&self, company_id: Uuid, external_id: &str) -> Option<JobRecord> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.company_id == company_id && j.external_id == external_id)
            .cloned()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_by_natural_key(
        &self,
        company_id: Uuid,
        external_id: &str,
    ) -> Result<Option<JobRecord>, CatalogError> {
        Ok(self.by_external_id(company_id, external_id))
    }

    async fn natural_keys(&self, company_id: Uuid) -> Result<HashMap<String, Uuid>, CatalogError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.company_id == company_id)
            .map(|j| (j.external_id.clone(), j.id))
            .collect())
    }

    async fn insert(&self, candidate: &JobCandidate) -> Result<JobRecord, CatalogError> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut jobs = self.jobs.lock().unwrap();
        if jobs
            .iter()
            .any(|j| j.company_id == candidate.company_id && j.external_id == candidate.external_id)
        {
            return Err(CatalogError::Conflict {
                company_id: candidate.company_id,
                external_id: candidate.external_id.clone(),
            });
        }
        let now = Utc::now();
        let record = JobRecord {
            id: Uuid::new_v4(),
            company_id: candidate.company_id,
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            location: candidate.location.clone(),
            department: candidate.department.clone(),
            job_type: candidate.job_type.clone(),
            salary_range: candidate.salary_range.clone(),
            job_url: candidate.job_url.clone(),
            external_id: candidate.external_id.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        jobs.push(record.clone());
        Ok(record)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: &JobUpdate,
    ) -> Result<Option<JobRecord>, CatalogError> {
        let mut jobs = self.jobs.lock().unwrap();
        Ok(jobs.iter_mut().find(|j| j.id == id).map(|job| {
            update.apply_to(job, Utc::now());
            job.clone()
        }))
    }

    async fn deactivate_missing(
        &self,
        company_id: Uuid,
        observed: &HashSet<String>,
    ) -> Result<u64, CatalogError> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut count = 0;
        for job in jobs.iter_mut().filter(|j| {
            j.company_id == company_id && j.is_active && !observed.contains(&j.external_id)
        }) {
            job.is_active = false;
            job.updated_at = Utc::now();
            count += 1;
        }
        Ok(count)
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobRecord>, CatalogError> {
        Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned())
    }

    async fn list(&self, filter: &JobFilter) -> Result<JobPage, CatalogError> {
        let search = filter.search.as_deref().map(str::to_lowercase);
        let mut jobs: Vec<JobRecord> = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| filter.company_id.map_or(true, |c| j.company_id == c))
            .filter(|j| filter.is_active.map_or(true, |a| j.is_active == a))
            .filter(|j| {
                search.as_deref().map_or(true, |s| {
                    j.title.to_lowercase().contains(s)
                        || j.description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(s))
                })
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = jobs.len() as i64;
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        let jobs = jobs.into_iter().skip(offset).take(limit).collect();
        Ok(JobPage { jobs, total })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Companies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCompanyDirectory {
    companies: Mutex<Vec<Company>>,
    rules: Mutex<HashMap<Uuid, ScrapingRule>>,
}

impl InMemoryCompanyDirectory {
    pub fn add(&self, name: &str, careers_url: &str) -> Uuid {
        let now = Utc::now();
        let company = Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
            careers_url: careers_url.to_string(),
            logo_url: None,
            is_active: true,
            last_scraped_at: None,
            created_at: now,
            updated_at: now,
        };
        let id = company.id;
        self.companies.lock().unwrap().push(company);
        id
    }

    pub fn set_rule(&self, company_id: Uuid, rule: ScrapingRule) {
        self.rules.lock().unwrap().insert(company_id, rule);
    }

    pub fn get(&self, id: Uuid) -> Option<Company> {
        self.companies.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryCompanyDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Company>, sqlx::Error> {
        Ok(self.get(id))
    }

    async fn list_active(&self) -> Result<Vec<Company>, sqlx::Error> {
        Ok(self
            .companies
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn scraping_rule(&self, company_id: Uuid) -> Result<Option<ScrapingRule>, sqlx::Error> {
        Ok(self.rules.lock().unwrap().get(&company_id).cloned())
    }

    async fn mark_last_scraped_at(&self, company_id: Uuid) -> Result<(), sqlx::Error> {
        if let Some(c) = self
            .companies
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.id == company_id)
        {
            c.last_scraped_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fetcher
// ────────────────────────────────────────────────────────────────────────────

/// Serves canned pages by URL. Unknown URLs answer 503.
#[derive(Default)]
pub struct StaticFetcher {
    pages: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn set_page(&self, url: &str, html: String) {
        self.pages.lock().unwrap().insert(url.to_string(), html);
    }

    pub fn remove_page(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }

    /// Number of fetches served so far, including misses.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tracking
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryTrackingStore {
    records: Mutex<Vec<TrackingRecord>>,
    /// When set, inserts for job ids outside this set fail as unknown jobs.
    known_jobs: Option<HashSet<Uuid>>,
}

impl InMemoryTrackingStore {
    pub fn with_jobs(jobs: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            records: Mutex::default(),
            known_jobs: Some(jobs.into_iter().collect()),
        }
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn insert(&self, new: NewTracking) -> Result<TrackingRecord, TrackingError> {
        if let Some(known) = &self.known_jobs {
            if !known.contains(&new.job_id) {
                return Err(TrackingError::JobNotFound(new.job_id));
            }
        }
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.user_id == new.user_id && r.job_id == new.job_id)
        {
            return Err(TrackingError::Conflict {
                user_id: new.user_id,
                job_id: new.job_id,
            });
        }
        let record = TrackingRecord {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            job_id: new.job_id,
            status: new.status,
            notes: new.notes,
            applied_at: new.applied_at,
            created_at: new.at,
            updated_at: new.at,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn update_with(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        step: TrackingStep<'_>,
    ) -> Result<Option<TrackingRecord>, TrackingError> {
        let mut records = self.records.lock().unwrap();
        Ok(records
            .iter_mut()
            .find(|r| r.user_id == user_id && r.job_id == job_id)
            .map(|record| {
                *record = step(record);
                record.clone()
            }))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TrackingRecord>, TrackingError> {
        let mut records: Vec<TrackingRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }
}
