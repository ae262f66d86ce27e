use dealflow_core::StatsStore;
use dealflow_cycle::CycleMetrics;
use std::sync::Arc;

/// Read-only view handed to the monitoring handlers. The orchestrator owns all writes.
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<dyn StatsStore>,
    pub metrics: Arc<CycleMetrics>,
}
