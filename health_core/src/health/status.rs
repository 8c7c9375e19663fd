use serde::{Deserialize, Serialize};

/// Effective health of a module. Only the resolver writes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Integrations either answer or they don't.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationHealth {
    Healthy,
    Unhealthy,
}

impl From<HealthStatus> for IntegrationHealth {
    /// A degraded answer is still an answer.
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Healthy | HealthStatus::Degraded => IntegrationHealth::Healthy,
            HealthStatus::Unhealthy => IntegrationHealth::Unhealthy,
        }
    }
}

impl std::fmt::Display for IntegrationHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrationHealth::Healthy => write!(f, "healthy"),
            IntegrationHealth::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Administrative on/off switch, independent of health.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    #[default]
    Active,
    Inactive,
}
