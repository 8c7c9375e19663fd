//! Status snapshots and threshold-based recommendations

use crate::config::ThresholdConfig;
use crate::health::{HealthStatus, IntegrationHealth};
use crate::metrics::{MetricsAggregator, SystemMetrics};
use crate::registry::{IntegrationRecord, IntegrationRegistry, ModuleRecord, ModuleRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ModuleCounts {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
}

impl ModuleCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a ModuleRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut counts, record| {
            counts.total += 1;
            match record.health {
                HealthStatus::Healthy => counts.healthy += 1,
                HealthStatus::Degraded => counts.degraded += 1,
                HealthStatus::Unhealthy => counts.unhealthy += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IntegrationCounts {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

impl IntegrationCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a IntegrationRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut counts, record| {
            counts.total += 1;
            match record.health {
                IntegrationHealth::Healthy => counts.healthy += 1,
                IntegrationHealth::Unhealthy => counts.unhealthy += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub overall: HealthStatus,
    pub modules: ModuleCounts,
    pub integrations: IntegrationCounts,
    pub metrics: SystemMetrics,
    pub uptime_ms: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub severity: Severity,
    pub message: String,
    pub suggested_action: String,
}

impl Recommendation {
    fn new(severity: Severity, message: impl Into<String>, suggested_action: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            suggested_action: suggested_action.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticsReport {
    #[serde(flatten)]
    pub status: StatusReport,
    pub module_details: Vec<ModuleRecord>,
    pub integration_details: Vec<IntegrationRecord>,
    pub recommendations: Vec<Recommendation>,
}

/// Integrations can only pull the result down to `unhealthy`; a degraded
/// overall status always comes from a module.
pub fn overall_health(modules: &ModuleCounts, integrations: &IntegrationCounts) -> HealthStatus {
    if modules.unhealthy > 0 || integrations.unhealthy > 0 {
        HealthStatus::Unhealthy
    } else if modules.degraded > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Every matching rule contributes, in a fixed order.
pub fn recommendations(status: &StatusReport, thresholds: &ThresholdConfig) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if status.modules.unhealthy > 0 {
        recommendations.push(Recommendation::new(
            Severity::Critical,
            format!("{} modules are unhealthy", status.modules.unhealthy),
            "restart unhealthy modules and check dependencies",
        ));
    }

    if status.modules.degraded > 0 {
        recommendations.push(Recommendation::new(
            Severity::Warning,
            format!("{} modules are degraded", status.modules.degraded),
            "check module dependencies and performance",
        ));
    }

    if status.integrations.unhealthy > 0 {
        recommendations.push(Recommendation::new(
            Severity::Warning,
            format!("{} integrations are unhealthy", status.integrations.unhealthy),
            "check integration configurations and network connectivity",
        ));
    }

    if status.metrics.system_load > thresholds.system_load_percent {
        recommendations.push(Recommendation::new(
            Severity::Warning,
            "High system load detected",
            "reduce background work or scale out the host",
        ));
    }

    if status.metrics.memory_usage > thresholds.memory_usage_percent {
        recommendations.push(Recommendation::new(
            Severity::Warning,
            "High memory usage detected",
            "run maintenance to clear caches and check for leaks",
        ));
    }

    if status.metrics.error_rate > thresholds.error_rate_percent {
        recommendations.push(Recommendation::new(
            Severity::Critical,
            "High error rate detected",
            "inspect recent failed requests and the health of their modules",
        ));
    }

    recommendations
}

/// Read-only view over the registries and metrics.
#[derive(Debug, Clone)]
pub struct DiagnosticsEngine {
    modules: ModuleRegistry,
    integrations: IntegrationRegistry,
    metrics: MetricsAggregator,
    thresholds: ThresholdConfig,
}

impl DiagnosticsEngine {
    pub fn new(
        modules: ModuleRegistry,
        integrations: IntegrationRegistry,
        metrics: MetricsAggregator,
        thresholds: ThresholdConfig,
    ) -> Self {
        Self {
            modules,
            integrations,
            metrics,
            thresholds,
        }
    }

    pub fn status(&self) -> StatusReport {
        let modules = self.modules.all();
        let integrations = self.integrations.all();
        self.build_status(&modules, &integrations)
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        let modules = self.modules.all();
        let integrations = self.integrations.all();
        let status = self.build_status(&modules, &integrations);
        let recommendations = recommendations(&status, &self.thresholds);

        DiagnosticsReport {
            status,
            module_details: modules,
            integration_details: integrations,
            recommendations,
        }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    fn build_status(&self, modules: &[ModuleRecord], integrations: &[IntegrationRecord]) -> StatusReport {
        let module_counts = ModuleCounts::tally(modules);
        let integration_counts = IntegrationCounts::tally(integrations);
        let metrics = self.metrics.current();

        StatusReport {
            overall: overall_health(&module_counts, &integration_counts),
            modules: module_counts,
            integrations: integration_counts,
            uptime_ms: metrics.uptime_ms,
            metrics,
            timestamp: Utc::now(),
        }
    }
}
