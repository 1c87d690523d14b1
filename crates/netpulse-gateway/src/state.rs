//! Gateway shared state
//!
//! Owns every engine behind one `Arc<RwLock<…>>`. The engines themselves
//! are single-writer and synchronous; the gateway serializes mutations
//! through this lock while queries share read access.

use std::sync::Arc;

use tokio::sync::RwLock;

use netpulse_agents::Coordinator;
use netpulse_anomaly::AnomalyEngine;
use netpulse_collect::UnifiedCollector;
use netpulse_monitor::{AlertManager, HealthEngine, SlaEvaluator};
use netpulse_topology::{NetworkScanner, TopologyGraph};

/// All engines composed for the API surface.
pub struct AppState {
    pub collector: UnifiedCollector,
    pub scanner: NetworkScanner,
    pub topology: TopologyGraph,
    pub health: HealthEngine,
    pub alerts: AlertManager,
    pub sla: SlaEvaluator,
    pub anomaly: AnomalyEngine,
    pub coordinator: Coordinator,
}

impl AppState {
    pub fn new(simulated: bool) -> Self {
        Self {
            collector: UnifiedCollector::new(simulated),
            scanner: NetworkScanner::new(simulated),
            topology: TopologyGraph::new(),
            health: HealthEngine::default(),
            alerts: AlertManager::new(),
            sla: SlaEvaluator::default(),
            anomaly: AnomalyEngine::new(),
            coordinator: Coordinator::new(simulated),
        }
    }
}

/// Shared state handle passed to every route handler.
pub type SharedState = Arc<RwLock<AppState>>;
