//! Registry of external integrations discovered at startup

use crate::error::ConfigurationError;
use crate::health::IntegrationHealth;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What the discovery collaborator knows about an integration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub integration_type: String,
}

impl IntegrationDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, integration_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            integration_type: integration_type.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub integration_type: String,
    pub health: IntegrationHealth,
    pub last_check: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub response_time_ms: Option<u64>,
    #[serde(skip)]
    check_token: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationCheck {
    pub health: IntegrationHealth,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub response_time_ms: Option<u64>,
}

impl IntegrationCheck {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            health: IntegrationHealth::Unhealthy,
            error: Some(error.into()),
            result: None,
            response_time_ms: None,
        }
    }
}

#[derive(Debug, Default)]
struct IntegrationTable {
    records: HashMap<String, IntegrationRecord>,
    order: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IntegrationRegistry {
    table: Arc<RwLock<IntegrationTable>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites an integration. Returns `true` when an existing
    /// entry was replaced.
    pub fn register(&self, descriptor: IntegrationDescriptor) -> Result<bool, ConfigurationError> {
        if descriptor.id.trim().is_empty() {
            return Err(ConfigurationError::EmptyId);
        }

        let mut record = IntegrationRecord {
            id: descriptor.id.clone(),
            name: descriptor.name,
            integration_type: descriptor.integration_type,
            health: IntegrationHealth::Healthy,
            last_check: None,
            error: None,
            result: None,
            response_time_ms: None,
            check_token: 0,
        };

        let mut table = self.table.write();
        if let Some(previous) = table.records.get(&descriptor.id) {
            record.check_token = previous.check_token + 1;
        }
        let replaced = table.records.insert(descriptor.id.clone(), record).is_some();
        if !replaced {
            table.order.push(descriptor.id);
        }
        Ok(replaced)
    }

    pub fn get(&self, id: &str) -> Option<IntegrationRecord> {
        self.table.read().records.get(id).cloned()
    }

    pub fn all(&self) -> Vec<IntegrationRecord> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|id| table.records.get(id).cloned())
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.table.read().order.clone()
    }

    pub fn set_health(&self, id: &str, health: IntegrationHealth, timestamp: DateTime<Utc>) -> bool {
        let mut table = self.table.write();
        match table.records.get_mut(id) {
            Some(record) => {
                record.check_token += 1;
                record.health = health;
                record.last_check = Some(timestamp);
                if health == IntegrationHealth::Healthy {
                    record.error = None;
                }
                true
            }
            None => false,
        }
    }

    pub fn mark_failed(&self, id: &str, error: impl Into<String>, timestamp: DateTime<Utc>) -> bool {
        let mut table = self.table.write();
        match table.records.get_mut(id) {
            Some(record) => {
                record.check_token += 1;
                record.health = IntegrationHealth::Unhealthy;
                record.error = Some(error.into());
                record.last_check = Some(timestamp);
                true
            }
            None => false,
        }
    }

    pub fn begin_check(&self, id: &str) -> Option<u64> {
        let mut table = self.table.write();
        table.records.get_mut(id).map(|record| {
            record.check_token += 1;
            record.check_token
        })
    }

    pub fn complete_check(
        &self,
        id: &str,
        token: u64,
        check: IntegrationCheck,
        timestamp: DateTime<Utc>,
    ) -> bool {
        let mut table = self.table.write();
        match table.records.get_mut(id) {
            Some(record) if record.check_token == token => {
                record.health = check.health;
                record.error = check.error;
                record.result = check.result;
                record.response_time_ms = check.response_time_ms;
                record.last_check = Some(timestamp);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().records.is_empty()
    }

    pub fn clear(&self) {
        let mut table = self.table.write();
        table.records.clear();
        table.order.clear();
    }
}
