//! Reconciliation cycle: fetch → extract → diff → upsert → deactivate.
//!
//! A cycle only reaches the deactivation pass after the fetch succeeded and
//! every upsert was written. Failed, partial or cancelled cycles leave the
//! active flags untouched.
//!
//! Writes for one company are serialized through a per-company lock; cycles
//! for different companies run independently.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::catalog::{CatalogError, CatalogStore};
use crate::companies::CompanyDirectory;
use crate::models::job::{JobCandidate, JobUpdate};
use crate::scraping::extractor::{Extractor, RuleError, SelectorExtractor};
use crate::scraping::fetcher::{DocumentFetcher, FetchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Fetching,
    Extracting,
    Diffing,
    Upserting,
    Deactivating,
    Done,
    Failed,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("company {0} not found")]
    CompanyNotFound(Uuid),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("company directory error: {0}")]
    Directory(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub company_id: Uuid,
    pub created: usize,
    pub updated: usize,
    pub deactivated: u64,
    /// Job containers dropped during extraction for missing required fields.
    pub dropped: usize,
}

/// Drives reconciliation cycles against an explicitly supplied catalog.
pub struct Reconciler {
    catalog: Arc<dyn CatalogStore>,
    companies: Arc<dyn CompanyDirectory>,
    fetcher: Arc<dyn DocumentFetcher>,
    locks: CompanyLocks,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        companies: Arc<dyn CompanyDirectory>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self {
            catalog,
            companies,
            fetcher,
            locks: CompanyLocks::default(),
        }
    }

    /// Runs one full cycle for `company_id`.
    pub async fn run(&self, company_id: Uuid) -> Result<ReconcileReport, ReconcileError> {
        let mut phase = CyclePhase::Fetching;
        let outcome = self.run_cycle(company_id, &mut phase).await;
        self.locks.prune(company_id);
        match outcome {
            Ok(report) => {
                info!(
                    "Reconciled company {company_id}: created={} updated={} deactivated={} dropped={}",
                    report.created, report.updated, report.deactivated, report.dropped
                );
                Ok(report)
            }
            Err(e) => {
                warn!("Reconciliation of company {company_id} failed during {phase:?}: {e}");
                advance(company_id, &mut phase, CyclePhase::Failed);
                Err(e)
            }
        }
    }

    async fn run_cycle(
        &self,
        company_id: Uuid,
        phase: &mut CyclePhase,
    ) -> Result<ReconcileReport, ReconcileError> {
        let company = self
            .companies
            .find_by_id(company_id)
            .await?
            .ok_or(ReconcileError::CompanyNotFound(company_id))?;
        let rule = self
            .companies
            .scraping_rule(company_id)
            .await?
            .unwrap_or_default();
        let extractor = SelectorExtractor::compile(&rule)?;
        let page_url = Url::parse(&company.careers_url).map_err(|_| FetchError::InvalidUrl {
            url: company.careers_url.clone(),
        })?;

        let html = self.fetcher.fetch(page_url.as_str()).await?;

        advance(company_id, phase, CyclePhase::Extracting);
        let extraction = extractor.extract(&html, company_id, &page_url);
        if extraction.dropped > 0 {
            info!(
                "Dropped {} incomplete job containers for company {company_id}",
                extraction.dropped
            );
        }
        let candidates = dedupe_by_external_id(extraction.candidates);
        let observed: HashSet<String> = candidates.iter().map(|c| c.external_id.clone()).collect();

        let lock = self.locks.lock_for(company_id);
        let _guard = lock.lock().await;

        advance(company_id, phase, CyclePhase::Diffing);
        let known = self.catalog.natural_keys(company_id).await?;
        let diff = Diff::compute(candidates, &known);
        debug!(
            "Company {company_id}: {} to create, {} to update",
            diff.creates.len(),
            diff.updates.len()
        );

        advance(company_id, phase, CyclePhase::Upserting);
        let (created, updated) = self.upsert(diff).await?;

        advance(company_id, phase, CyclePhase::Deactivating);
        let deactivated = if observed.is_empty() {
            warn!("Company {company_id} yielded no jobs; skipping deactivation");
            0
        } else {
            self.catalog.deactivate_missing(company_id, &observed).await?
        };

        if let Err(e) = self.companies.mark_last_scraped_at(company_id).await {
            warn!("Failed to stamp last_scraped_at for company {company_id}: {e}");
        }

        advance(company_id, phase, CyclePhase::Done);
        Ok(ReconcileReport {
            company_id,
            created,
            updated,
            deactivated,
            dropped: extraction.dropped,
        })
    }

    /// Writes the diff: batched refreshes first, then inserts. Returns
    /// `(created, updated)`.
    async fn upsert(&self, diff: Diff) -> Result<(usize, usize), CatalogError> {
        let Diff { updates, mut creates } = diff;

        let batch: Vec<(Uuid, JobUpdate)> = updates
            .iter()
            .map(|(id, candidate)| (*id, JobUpdate::refresh_from(candidate)))
            .collect();
        let written: HashSet<Uuid> = self.catalog.update_many(&batch).await?.into_iter().collect();
        let mut updated = written.len();

        // A known id that vanished before the write goes back through insert.
        creates.extend(
            updates
                .into_iter()
                .filter(|(id, _)| !written.contains(id))
                .map(|(_, candidate)| candidate),
        );

        let mut created = 0;
        for candidate in &creates {
            match self.catalog.insert(candidate).await {
                Ok(_) => created += 1,
                Err(CatalogError::Conflict { .. }) => {
                    debug!(
                        "Job '{}' of company {} was inserted concurrently; updating instead",
                        candidate.external_id, candidate.company_id
                    );
                    match self.update_after_conflict(candidate).await? {
                        Written::Updated => updated += 1,
                        Written::Created => created += 1,
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok((created, updated))
    }

    /// Refreshes the row that won an insert race. If that row is gone by the
    /// time we look for it, the insert is attempted once more.
    async fn update_after_conflict(&self, candidate: &JobCandidate) -> Result<Written, CatalogError> {
        let existing = self
            .catalog
            .find_by_natural_key(candidate.company_id, &candidate.external_id)
            .await?;
        if let Some(existing) = existing {
            let refreshed = self
                .catalog
                .update_fields(existing.id, &JobUpdate::refresh_from(candidate))
                .await?;
            if refreshed.is_some() {
                return Ok(Written::Updated);
            }
        }

        debug!(
            "Conflicting job '{}' of company {} vanished; inserting again",
            candidate.external_id, candidate.company_id
        );
        self.catalog.insert(candidate).await?;
        Ok(Written::Created)
    }
}

enum Written {
    Created,
    Updated,
}

/// Candidates split by whether their natural key is already catalogued.
struct Diff {
    updates: Vec<(Uuid, JobCandidate)>,
    creates: Vec<JobCandidate>,
}

impl Diff {
    fn compute(candidates: Vec<JobCandidate>, known: &HashMap<String, Uuid>) -> Self {
        let mut diff = Diff {
            updates: Vec::new(),
            creates: Vec::new(),
        };
        for candidate in candidates {
            match known.get(&candidate.external_id) {
                Some(id) => diff.updates.push((*id, candidate)),
                None => diff.creates.push(candidate),
            }
        }
        diff
    }
}

/// Collapses repeated external ids, keeping the last observation in the
/// position of the first.
fn dedupe_by_external_id(candidates: Vec<JobCandidate>) -> Vec<JobCandidate> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<JobCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match positions.get(&candidate.external_id) {
            Some(&i) => unique[i] = candidate,
            None => {
                positions.insert(candidate.external_id.clone(), unique.len());
                unique.push(candidate);
            }
        }
    }
    unique
}

fn advance(company_id: Uuid, phase: &mut CyclePhase, next: CyclePhase) {
    debug!("Company {company_id}: {phase:?} -> {next:?}");
    *phase = next;
}

/// One async mutex per company, created on first use.
#[derive(Default)]
struct CompanyLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl CompanyLocks {
    fn lock_for(&self, company_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(company_id).or_default().clone()
    }

    /// Drops the company's entry once no cycle holds or awaits it.
    fn prune(&self, company_id: Uuid) {
        let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&company_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&company_id);
        }
    }
}
