use std::sync::Arc;

use crate::catalog::CatalogStore;
use crate::scraping::reconciler::Reconciler;
use crate::tracking::TrackingStateMachine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub tracking: Arc<TrackingStateMachine>,
    pub reconciler: Arc<Reconciler>,
}
