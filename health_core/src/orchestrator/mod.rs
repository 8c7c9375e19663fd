//! Corrective action sequences and the reports they produce

pub mod maintenance;
pub mod recovery;

pub use maintenance::MaintenanceOrchestrator;
pub use recovery::RecoveryOrchestrator;

use crate::collaborators::CacheClearer;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorKind {
    Maintenance,
    Recovery,
}

impl std::fmt::Display for OrchestratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorKind::Maintenance => write!(f, "maintenance"),
            OrchestratorKind::Recovery => write!(f, "recovery"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub success: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorReport {
    pub id: Uuid,
    pub kind: OrchestratorKind,
    pub timestamp: DateTime<Utc>,
    pub actions_taken: Vec<String>,
    pub results: BTreeMap<String, StepResult>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrchestratorReport {
    pub(crate) fn new(kind: OrchestratorKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            actions_taken: Vec::new(),
            results: BTreeMap::new(),
            success: true,
            error: None,
        }
    }

    /// Records one step. A failed step marks the whole report failed but
    /// never stops the caller from running the next one.
    pub(crate) fn record(&mut self, step: &str, outcome: Result<String, EngineError>) {
        self.actions_taken.push(step.to_string());

        let result = match outcome {
            Ok(detail) => {
                info!(kind = %self.kind, step, "{}", detail);
                StepResult {
                    success: true,
                    detail,
                    error: None,
                }
            }
            Err(e) => {
                error!(kind = %self.kind, step, "Step failed: {}", e);
                let message = e.to_string();
                self.success = false;
                self.error = Some(match self.error.take() {
                    Some(previous) => format!("{}; {}", previous, message),
                    None => message.clone(),
                });
                StepResult {
                    success: false,
                    detail: format!("{} failed", step),
                    error: Some(message),
                }
            }
        };

        self.results.insert(step.to_string(), result);
    }

    pub fn step(&self, step: &str) -> Option<&StepResult> {
        self.results.get(step)
    }
}

/// Clears every cache, attempting all of them even when some fail.
pub(crate) async fn clear_caches(caches: &[Arc<dyn CacheClearer>]) -> Result<String, EngineError> {
    let mut failures = Vec::new();

    for cache in caches {
        if let Err(e) = cache.clear_cache().await {
            failures.push(format!("{}: {}", cache.name(), e));
        }
    }

    if failures.is_empty() {
        Ok(format!("Cleared {} caches", caches.len()))
    } else {
        Err(EngineError::OrchestratorStep {
            step: "clear_caches".to_string(),
            message: failures.join(", "),
        })
    }
}
