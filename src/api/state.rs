//! Shared handler state

use std::sync::Arc;

use crate::checkout::CheckoutOrchestrator;
use crate::db::Database;
use crate::payment::ReconciliationService;
use crate::shipment::ShipmentTracker;

pub struct AppState {
    pub orchestrator: Arc<CheckoutOrchestrator>,
    pub reconciliation: Arc<ReconciliationService>,
    pub tracker: Arc<ShipmentTracker>,
    /// None when running on the in-memory backends
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<CheckoutOrchestrator>,
        reconciliation: Arc<ReconciliationService>,
        tracker: Arc<ShipmentTracker>,
        db: Option<Arc<Database>>,
    ) -> Self {
        Self {
            orchestrator,
            reconciliation,
            tracker,
            db,
        }
    }
}
