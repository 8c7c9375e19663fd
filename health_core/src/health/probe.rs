//! Probe contract and the catalog that maps entities to their probes

use super::status::HealthStatus;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What a probe reports back when it answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeReport {
    pub status: HealthStatus,
    pub response_time_ms: Option<u64>,
    pub details: Option<serde_json::Value>,
}

impl ProbeReport {
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            response_time_ms: None,
            details: None,
        }
    }

    pub fn healthy() -> Self {
        Self::new(HealthStatus::Healthy)
    }

    pub fn degraded() -> Self {
        Self::new(HealthStatus::Degraded)
    }

    pub fn unhealthy() -> Self {
        Self::new(HealthStatus::Unhealthy)
    }

    pub fn with_response_time(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// An asynchronous health check for one entity. An `Err` is a probe failure.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, id: &str) -> Result<ProbeReport>;
}

/// Catalog key. Modules and integrations live in separate namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeKey {
    Module(String),
    Integration(String),
}

impl ProbeKey {
    pub fn module(id: impl Into<String>) -> Self {
        ProbeKey::Module(id.into())
    }

    pub fn integration(id: impl Into<String>) -> Self {
        ProbeKey::Integration(id.into())
    }
}

#[derive(Clone, Default)]
pub struct ProbeCatalog {
    probes: HashMap<ProbeKey, Arc<dyn Probe>>,
}

impl ProbeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module_probe<P: Probe + 'static>(mut self, id: impl Into<String>, probe: P) -> Self {
        self.register(ProbeKey::module(id), Arc::new(probe));
        self
    }

    pub fn with_integration_probe<P: Probe + 'static>(
        mut self,
        id: impl Into<String>,
        probe: P,
    ) -> Self {
        self.register(ProbeKey::integration(id), Arc::new(probe));
        self
    }

    pub fn register(&mut self, key: ProbeKey, probe: Arc<dyn Probe>) {
        self.probes.insert(key, probe);
    }

    pub fn module(&self, id: &str) -> Option<Arc<dyn Probe>> {
        self.probes.get(&ProbeKey::module(id)).cloned()
    }

    pub fn integration(&self, id: &str) -> Option<Arc<dyn Probe>> {
        self.probes.get(&ProbeKey::integration(id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl std::fmt::Debug for ProbeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeCatalog")
            .field("probes", &self.probes.keys().collect::<Vec<_>>())
            .finish()
    }
}
