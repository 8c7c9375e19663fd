use super::{clear_caches, OrchestratorKind, OrchestratorReport};
use crate::collaborators::Collaborators;
use crate::error::EngineError;
use crate::health::{DependencyResolver, HealthStatus};
use crate::metrics::MetricsAggregator;
use crate::registry::{ModuleCheck, ModuleRegistry};
use chrono::Utc;
use tracing::{info, warn};

pub const STEP_CLEAR_CACHES: &str = "clear_caches";
pub const STEP_CLEANUP_STALE_DATA: &str = "cleanup_stale_data";
pub const STEP_RESTART_MODULES: &str = "restart_unhealthy_modules";
pub const STEP_REFRESH_METRICS: &str = "refresh_metrics";

/// Clears caches, prunes stale data, restarts unhealthy modules and
/// refreshes metrics. Only modules that were unhealthy when the run started
/// have their health touched.
#[derive(Debug, Clone)]
pub struct MaintenanceOrchestrator {
    modules: ModuleRegistry,
    resolver: DependencyResolver,
    metrics: MetricsAggregator,
    collaborators: Collaborators,
    retention_days: u32,
}

impl MaintenanceOrchestrator {
    pub fn new(
        modules: ModuleRegistry,
        resolver: DependencyResolver,
        metrics: MetricsAggregator,
        collaborators: Collaborators,
        retention_days: u32,
    ) -> Self {
        Self {
            modules,
            resolver,
            metrics,
            collaborators,
            retention_days,
        }
    }

    pub async fn run(&self) -> OrchestratorReport {
        info!("Starting maintenance");
        let mut report = OrchestratorReport::new(OrchestratorKind::Maintenance);

        report.record(STEP_CLEAR_CACHES, clear_caches(&self.collaborators.caches).await);
        report.record(STEP_CLEANUP_STALE_DATA, self.cleanup_stale_data().await);
        report.record(STEP_RESTART_MODULES, self.restart_unhealthy_modules().await);

        let metrics = self.metrics.snapshot().await;
        report.record(
            STEP_REFRESH_METRICS,
            Ok(format!(
                "Metrics refreshed (error rate {:.2}%)",
                metrics.error_rate
            )),
        );

        info!(success = report.success, "Maintenance finished");
        report
    }

    async fn cleanup_stale_data(&self) -> Result<String, EngineError> {
        let mut removed = 0u64;
        let mut failures = Vec::new();

        for cleaner in &self.collaborators.stale_data {
            match cleaner.cleanup_older_than(self.retention_days).await {
                Ok(count) => removed += count,
                Err(e) => failures.push(format!("{}: {}", cleaner.name(), e)),
            }
        }

        if failures.is_empty() {
            Ok(format!(
                "Removed {} entries older than {} days",
                removed, self.retention_days
            ))
        } else {
            Err(EngineError::OrchestratorStep {
                step: STEP_CLEANUP_STALE_DATA.to_string(),
                message: failures.join(", "),
            })
        }
    }

    /// Unhealthy modules are restarted in dependency order, so a restored
    /// dependency is visible to the dependents restarted after it. A module
    /// comes back `healthy` only when its dependencies are healthy and its
    /// own probe passes. Anything else fails the step.
    async fn restart_unhealthy_modules(&self) -> Result<String, EngineError> {
        let unhealthy = self.modules.ids_with_health(HealthStatus::Unhealthy);
        let targets: Vec<String> = self
            .modules
            .evaluation_layers()
            .into_iter()
            .flatten()
            .filter(|id| unhealthy.contains(id))
            .collect();

        let mut restored = 0usize;
        let mut failures = Vec::new();

        for id in &targets {
            match self.restart_module(id).await {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!(module = %id, "Module not restored: {}", e);
                    failures.push(format!("{}: {}", id, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(format!("Restarted {} of {} unhealthy modules", restored, targets.len()))
        } else {
            Err(EngineError::OrchestratorStep {
                step: STEP_RESTART_MODULES.to_string(),
                message: failures.join(", "),
            })
        }
    }

    /// A dependency that is still not healthy leaves the module `degraded`
    /// without probing it, the same as a sweep would.
    async fn restart_module(&self, id: &str) -> Result<(), EngineError> {
        if let Some(restarter) = &self.collaborators.restarter {
            restarter.restart(id).await?;
        }

        let token = self
            .modules
            .begin_check(id)
            .ok_or_else(|| EngineError::NotFound(format!("module '{}'", id)))?;
        let record = self
            .modules
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("module '{}'", id)))?;

        let blocked_by = record
            .dependencies
            .iter()
            .map(|dependency| (dependency, self.modules.health_of(dependency)))
            .find(|(_, health)| *health != Some(HealthStatus::Healthy));

        let (check, outcome) = if let Some((dependency, dependency_health)) = blocked_by {
            let dependency_health = dependency_health
                .map(|h| h.to_string())
                .unwrap_or_else(|| "missing".to_string());
            let check = ModuleCheck {
                health: HealthStatus::Degraded,
                error: None,
                response_time_ms: None,
                details: Some(serde_json::json!({
                    "blocked_by": dependency,
                    "dependency_health": dependency_health,
                })),
            };
            let message = format!("dependency '{}' is {}", dependency, dependency_health);
            (check, Err(EngineError::probe(id, message)))
        } else {
            match self.resolver.probe_module(id).await {
                Ok(report) if report.status == HealthStatus::Healthy => (
                    ModuleCheck {
                        health: HealthStatus::Healthy,
                        error: None,
                        response_time_ms: report.response_time_ms,
                        details: report.details,
                    },
                    Ok(()),
                ),
                Ok(report) => {
                    let message = format!("probe reported {}", report.status);
                    (ModuleCheck::failed(message.clone()), Err(EngineError::probe(id, message)))
                }
                Err(e) => (ModuleCheck::failed(e.to_string()), Err(e)),
            }
        };

        self.modules.complete_check(id, token, check, Utc::now());
        if outcome.is_ok() {
            info!(module = id, "Module restarted and healthy");
        }
        outcome
    }
}
