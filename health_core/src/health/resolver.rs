//! Effective-health resolution for modules and integrations

use super::probe::{ProbeCatalog, ProbeReport};
use super::status::{HealthStatus, IntegrationHealth};
use crate::registry::{IntegrationCheck, IntegrationRegistry, ModuleCheck, ModuleRegistry};
use crate::{EngineError, Result};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SweepKind {
    Modules,
    Integrations,
}

impl std::fmt::Display for SweepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepKind::Modules => write!(f, "modules"),
            SweepKind::Integrations => write!(f, "integrations"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepSummary {
    pub kind: SweepKind,
    pub started_at: DateTime<Utc>,
    pub checked: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub duration_ms: u64,
}

impl SweepSummary {
    fn new(kind: SweepKind) -> Self {
        Self {
            kind,
            started_at: Utc::now(),
            checked: 0,
            healthy: 0,
            degraded: 0,
            unhealthy: 0,
            duration_ms: 0,
        }
    }

    fn count(&mut self, health: HealthStatus) {
        self.checked += 1;
        match health {
            HealthStatus::Healthy => self.healthy += 1,
            HealthStatus::Degraded => self.degraded += 1,
            HealthStatus::Unhealthy => self.unhealthy += 1,
        }
    }
}

/// Runs probes and writes effective health back into the registries.
///
/// A module whose dependencies are not all healthy is `degraded` and its own
/// probe is skipped for that cycle. Otherwise its own probe decides, with a
/// missing probe counting as healthy. Every probe call is bounded by
/// `probe_timeout`; a timeout or error is `unhealthy`.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    modules: ModuleRegistry,
    integrations: IntegrationRegistry,
    catalog: Arc<ProbeCatalog>,
    probe_timeout: Duration,
}

impl DependencyResolver {
    pub fn new(
        modules: ModuleRegistry,
        integrations: IntegrationRegistry,
        catalog: Arc<ProbeCatalog>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            modules,
            integrations,
            catalog,
            probe_timeout,
        }
    }

    pub async fn resolve_module(&self, id: &str) -> Result<HealthStatus> {
        let token = self
            .modules
            .begin_check(id)
            .ok_or_else(|| EngineError::NotFound(format!("module '{}'", id)))?;
        let record = self
            .modules
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("module '{}'", id)))?;

        for dependency in &record.dependencies {
            let dependency_health = self.modules.health_of(dependency);
            if dependency_health != Some(HealthStatus::Healthy) {
                let check = ModuleCheck {
                    health: HealthStatus::Degraded,
                    error: None,
                    response_time_ms: None,
                    details: Some(serde_json::json!({
                        "blocked_by": dependency,
                        "dependency_health": dependency_health
                            .map(|h| h.to_string())
                            .unwrap_or_else(|| "missing".to_string()),
                    })),
                };
                warn!(module = id, dependency = %dependency, "Module degraded by dependency");
                self.write_module(id, token, check);
                return Ok(HealthStatus::Degraded);
            }
        }

        let check = match self.catalog.module(id) {
            None => {
                debug!(module = id, "No probe registered, assuming healthy");
                ModuleCheck::new(HealthStatus::Healthy)
            }
            Some(_) => match self.probe_module(id).await {
                Ok(report) => ModuleCheck {
                    health: report.status,
                    error: None,
                    response_time_ms: report.response_time_ms,
                    details: report.details,
                },
                Err(e) => {
                    error!(module = id, "Module probe failed: {}", e);
                    ModuleCheck::failed(e.to_string())
                }
            },
        };

        let health = check.health;
        match health {
            HealthStatus::Healthy => debug!(module = id, "Module healthy"),
            HealthStatus::Degraded => warn!(module = id, "Module reported degraded"),
            HealthStatus::Unhealthy => {}
        }
        self.write_module(id, token, check);
        Ok(health)
    }

    /// Runs only the module's own probe, without dependency checks or
    /// registry writes. A missing probe reports healthy.
    pub async fn probe_module(&self, id: &str) -> Result<ProbeReport> {
        match self.catalog.module(id) {
            Some(probe) => self.run_probe(id, probe.probe(id)).await,
            None => Ok(ProbeReport::healthy()),
        }
    }

    pub async fn resolve_integration(&self, id: &str) -> Result<IntegrationHealth> {
        let token = self
            .integrations
            .begin_check(id)
            .ok_or_else(|| EngineError::NotFound(format!("integration '{}'", id)))?;

        let outcome = match self.catalog.integration(id) {
            Some(probe) => self.run_probe(id, probe.probe(id)).await,
            None => {
                debug!(integration = id, "No probe registered, assuming healthy");
                Ok(ProbeReport::healthy())
            }
        };

        let check = match outcome {
            Ok(report) => IntegrationCheck {
                health: IntegrationHealth::from(report.status),
                error: None,
                result: report.details,
                response_time_ms: report.response_time_ms,
            },
            Err(e) => {
                error!(integration = id, "Integration probe failed: {}", e);
                IntegrationCheck::failed(e.to_string())
            }
        };

        let health = check.health;
        if !self.integrations.complete_check(id, token, check, Utc::now()) {
            debug!(integration = id, "Discarded superseded integration result");
        }
        Ok(health)
    }

    /// Resolves every module, layer by layer in dependency order. Modules in
    /// the same layer are probed concurrently, each in its own task.
    pub async fn sweep_modules(&self) -> SweepSummary {
        let started = Instant::now();
        let mut summary = SweepSummary::new(SweepKind::Modules);

        for layer in self.modules.evaluation_layers() {
            let handles: Vec<_> = layer
                .iter()
                .map(|id| {
                    let resolver = self.clone();
                    let id = id.clone();
                    tokio::spawn(async move { resolver.resolve_module(&id).await })
                })
                .collect();

            for (id, joined) in layer.iter().zip(join_all(handles).await) {
                let health = match joined {
                    Ok(Ok(health)) => health,
                    Ok(Err(e)) => {
                        error!(module = %id, "Module resolution failed: {}", e);
                        self.modules.mark_failed(id, e.to_string(), Utc::now());
                        HealthStatus::Unhealthy
                    }
                    Err(e) => {
                        error!(module = %id, "Module resolution task aborted: {}", e);
                        self.modules
                            .mark_failed(id, format!("resolution aborted: {}", e), Utc::now());
                        HealthStatus::Unhealthy
                    }
                };
                summary.count(health);
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            checked = summary.checked,
            healthy = summary.healthy,
            degraded = summary.degraded,
            unhealthy = summary.unhealthy,
            "Module sweep completed in {}ms",
            summary.duration_ms
        );
        summary
    }

    /// Probes every integration concurrently.
    pub async fn sweep_integrations(&self) -> SweepSummary {
        let started = Instant::now();
        let mut summary = SweepSummary::new(SweepKind::Integrations);
        let ids = self.integrations.ids();

        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let resolver = self.clone();
                let id = id.clone();
                tokio::spawn(async move { resolver.resolve_integration(&id).await })
            })
            .collect();

        for (id, joined) in ids.iter().zip(join_all(handles).await) {
            let health = match joined {
                Ok(Ok(health)) => health,
                Ok(Err(e)) => {
                    error!(integration = %id, "Integration resolution failed: {}", e);
                    self.integrations.mark_failed(id, e.to_string(), Utc::now());
                    IntegrationHealth::Unhealthy
                }
                Err(e) => {
                    error!(integration = %id, "Integration resolution task aborted: {}", e);
                    self.integrations
                        .mark_failed(id, format!("resolution aborted: {}", e), Utc::now());
                    IntegrationHealth::Unhealthy
                }
            };
            summary.count(match health {
                IntegrationHealth::Healthy => HealthStatus::Healthy,
                IntegrationHealth::Unhealthy => HealthStatus::Unhealthy,
            });
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            checked = summary.checked,
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            "Integration sweep completed in {}ms",
            summary.duration_ms
        );
        summary
    }

    async fn run_probe<F>(&self, id: &str, probe: F) -> Result<ProbeReport>
    where
        F: std::future::Future<Output = Result<ProbeReport>>,
    {
        let start = Instant::now();
        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(mut report)) => {
                if report.response_time_ms.is_none() {
                    report.response_time_ms = Some(start.elapsed().as_millis() as u64);
                }
                Ok(report)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(EngineError::ProbeTimeout {
                id: id.to_string(),
                timeout_ms: self.probe_timeout.as_millis() as u64,
            }),
        }
    }

    fn write_module(&self, id: &str, token: u64, check: ModuleCheck) {
        if !self.modules.complete_check(id, token, check, Utc::now()) {
            debug!(module = id, "Discarded superseded module result");
        }
    }
}
