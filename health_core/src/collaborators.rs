//! Capabilities the engine consumes from the surrounding application

use crate::registry::IntegrationDescriptor;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[async_trait::async_trait]
pub trait IntegrationDiscovery: Send + Sync {
    async fn list_integrations(&self) -> Result<Vec<IntegrationDescriptor>>;
}

#[async_trait::async_trait]
pub trait CacheClearer: Send + Sync {
    fn name(&self) -> &str;
    async fn clear_cache(&self) -> Result<()>;
}

#[async_trait::async_trait]
pub trait StaleDataCleaner: Send + Sync {
    fn name(&self) -> &str;
    /// Returns how many entries were removed.
    async fn cleanup_older_than(&self, days: u32) -> Result<u64>;
}

/// Platform gauges in percent. `None` means the gauge is unavailable.
pub trait SystemGauges: Send + Sync {
    fn system_load(&self) -> Option<f64>;
    fn memory_usage_percent(&self) -> Option<f64>;
}

#[async_trait::async_trait]
pub trait SecurityPosture: Send + Sync {
    async fn security_snapshot(&self) -> Result<SecuritySnapshot>;
}

#[async_trait::async_trait]
pub trait ModuleRestarter: Send + Sync {
    async fn restart(&self, module_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SecuritySnapshot {
    pub threat_level: ThreatLevel,
    pub details: Option<serde_json::Value>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl SecuritySnapshot {
    pub fn new(threat_level: ThreatLevel) -> Self {
        Self {
            threat_level,
            details: None,
            captured_at: Some(Utc::now()),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Discovery backed by a fixed list, for deployments that configure
/// integrations statically.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    integrations: Vec<IntegrationDescriptor>,
}

impl StaticDiscovery {
    pub fn new(integrations: Vec<IntegrationDescriptor>) -> Self {
        Self { integrations }
    }
}

#[async_trait::async_trait]
impl IntegrationDiscovery for StaticDiscovery {
    async fn list_integrations(&self) -> Result<Vec<IntegrationDescriptor>> {
        Ok(self.integrations.clone())
    }
}

/// Everything the engine talks to besides probes. Every capability is optional.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub discovery: Option<Arc<dyn IntegrationDiscovery>>,
    pub caches: Vec<Arc<dyn CacheClearer>>,
    pub stale_data: Vec<Arc<dyn StaleDataCleaner>>,
    pub gauges: Option<Arc<dyn SystemGauges>>,
    pub security: Option<Arc<dyn SecurityPosture>>,
    pub restarter: Option<Arc<dyn ModuleRestarter>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discovery<D: IntegrationDiscovery + 'static>(mut self, discovery: D) -> Self {
        self.discovery = Some(Arc::new(discovery));
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheClearer>) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn with_stale_data_cleaner(mut self, cleaner: Arc<dyn StaleDataCleaner>) -> Self {
        self.stale_data.push(cleaner);
        self
    }

    pub fn with_gauges(mut self, gauges: Arc<dyn SystemGauges>) -> Self {
        self.gauges = Some(gauges);
        self
    }

    pub fn with_security<S: SecurityPosture + 'static>(mut self, security: S) -> Self {
        self.security = Some(Arc::new(security));
        self
    }

    pub fn with_restarter<R: ModuleRestarter + 'static>(mut self, restarter: R) -> Self {
        self.restarter = Some(Arc::new(restarter));
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("discovery", &self.discovery.is_some())
            .field("caches", &self.caches.iter().map(|c| c.name().to_string()).collect::<Vec<_>>())
            .field("stale_data", &self.stale_data.iter().map(|c| c.name().to_string()).collect::<Vec<_>>())
            .field("gauges", &self.gauges.is_some())
            .field("security", &self.security.is_some())
            .field("restarter", &self.restarter.is_some())
            .finish()
    }
}
