use super::{clear_caches, OrchestratorKind, OrchestratorReport};
use crate::collaborators::Collaborators;
use crate::health::HealthStatus;
use crate::metrics::MetricsAggregator;
use crate::registry::ModuleRegistry;
use chrono::Utc;
use tracing::warn;

pub const STEP_RESET_MODULES: &str = "reset_module_health";
pub const STEP_CLEAR_CACHES: &str = "clear_caches";
pub const STEP_RESET_METRICS: &str = "reset_metrics";

/// Full reset. Forces every module healthy, clears caches and zeroes the
/// request counters. Integrations and gauge readings are left for the next
/// scheduled sweep and metrics tick.
#[derive(Debug, Clone)]
pub struct RecoveryOrchestrator {
    modules: ModuleRegistry,
    metrics: MetricsAggregator,
    collaborators: Collaborators,
}

impl RecoveryOrchestrator {
    pub fn new(modules: ModuleRegistry, metrics: MetricsAggregator, collaborators: Collaborators) -> Self {
        Self {
            modules,
            metrics,
            collaborators,
        }
    }

    pub async fn run(&self) -> OrchestratorReport {
        warn!("Starting full recovery");
        let mut report = OrchestratorReport::new(OrchestratorKind::Recovery);

        let reset = self.modules.force_all(HealthStatus::Healthy, Utc::now());
        report.record(STEP_RESET_MODULES, Ok(format!("Forced {} modules healthy", reset)));

        report.record(STEP_CLEAR_CACHES, clear_caches(&self.collaborators.caches).await);

        self.metrics.reset();
        report.record(STEP_RESET_METRICS, Ok("Metrics counters reset".to_string()));

        report
    }
}
