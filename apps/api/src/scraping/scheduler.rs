//! Periodic scraping of every active company.
//!
//! ```text
//! tick (every SCRAPE_INTERVAL_SECS)
//!     └─► list_active()
//!             └─► one reconciliation cycle per company,
//!                 at most SCRAPE_CONCURRENCY at once,
//!                 each bounded by SCRAPE_CYCLE_TIMEOUT_SECS
//! ```
//!
//! A cycle that times out is dropped before it can deactivate anything and
//! is simply retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::companies::CompanyDirectory;
use crate::scraping::reconciler::Reconciler;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

pub struct ScrapeScheduler {
    reconciler: Arc<Reconciler>,
    companies: Arc<dyn CompanyDirectory>,
    concurrency: usize,
    cycle_timeout: Duration,
}

impl ScrapeScheduler {
    pub fn new(
        reconciler: Arc<Reconciler>,
        companies: Arc<dyn CompanyDirectory>,
        concurrency: usize,
        cycle_timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            companies,
            concurrency: concurrency.max(1),
            cycle_timeout,
        }
    }

    /// Runs a sweep every `interval` until the returned task is aborted.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Scrape scheduler started (every {}s, concurrency {})",
                interval.as_secs(),
                self.concurrency
            );
            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(summary) => info!(
                        "Scrape sweep finished: {} ok, {} failed, {} timed out",
                        summary.succeeded, summary.failed, summary.timed_out
                    ),
                    Err(e) => error!("Scrape sweep could not list companies: {e}"),
                }
            }
        })
    }

    /// One pass over all active companies.
    pub async fn sweep(&self) -> Result<SweepSummary, sqlx::Error> {
        let companies = self.companies.list_active().await?;
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut cycles: JoinSet<(Uuid, CycleOutcome)> = JoinSet::new();

        for company in companies {
            let permits = permits.clone();
            let reconciler = self.reconciler.clone();
            let timeout = self.cycle_timeout;
            cycles.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (company.id, CycleOutcome::Failed);
                };
                let outcome = match tokio::time::timeout(timeout, reconciler.run(company.id)).await {
                    Ok(Ok(_)) => CycleOutcome::Succeeded,
                    Ok(Err(_)) => CycleOutcome::Failed,
                    Err(_) => CycleOutcome::TimedOut,
                };
                (company.id, outcome)
            });
        }

        let mut summary = SweepSummary::default();
        while let Some(joined) = cycles.join_next().await {
            match joined {
                Ok((_, CycleOutcome::Succeeded)) => summary.succeeded += 1,
                Ok((_, CycleOutcome::Failed)) => summary.failed += 1,
                Ok((company_id, CycleOutcome::TimedOut)) => {
                    warn!("Reconciliation of company {company_id} timed out; skipped until next sweep");
                    summary.timed_out += 1;
                }
                Err(e) => {
                    error!("Reconciliation task panicked: {e}");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Succeeded,
    Failed,
    TimedOut,
}
