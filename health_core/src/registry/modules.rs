//! Registry of functional modules and their dependency edges

use super::graph::{self, Edges};
use super::manifest::ModuleDefinition;
use crate::error::ConfigurationError;
use crate::health::{HealthStatus, ModuleStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleRecord {
    pub id: String,
    pub name: String,
    pub status: ModuleStatus,
    pub dependencies: Vec<String>,
    pub health: HealthStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub response_time_ms: Option<u64>,
    pub details: Option<serde_json::Value>,
    #[serde(skip)]
    check_token: u64,
}

impl ModuleRecord {
    fn from_definition(definition: ModuleDefinition) -> Self {
        Self {
            id: definition.id,
            name: definition.name,
            status: definition.status,
            dependencies: definition.dependencies,
            health: HealthStatus::Healthy,
            last_check: None,
            error: None,
            response_time_ms: None,
            details: None,
            check_token: 0,
        }
    }
}

/// Result of one module resolution, written back through [`ModuleRegistry::complete_check`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleCheck {
    pub health: HealthStatus,
    pub error: Option<String>,
    pub response_time_ms: Option<u64>,
    pub details: Option<serde_json::Value>,
}

impl ModuleCheck {
    pub fn new(health: HealthStatus) -> Self {
        Self {
            health,
            error: None,
            response_time_ms: None,
            details: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            health: HealthStatus::Unhealthy,
            error: Some(error.into()),
            response_time_ms: None,
            details: None,
        }
    }
}

#[derive(Debug, Default)]
struct ModuleTable {
    records: HashMap<String, ModuleRecord>,
    order: Vec<String>,
}

impl ModuleTable {
    fn edges(&self) -> Edges<'_> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|record| (record.id.as_str(), record.dependencies.as_slice()))
            .collect()
    }
}

/// Every record update happens under one write lock, so readers see the
/// health and timestamp of a record change together.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    table: Arc<RwLock<ModuleTable>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a module. Only rejects empty ids and
    /// self-dependency; graph-wide checks live in [`Self::validate_candidate`].
    pub fn register(&self, definition: ModuleDefinition) -> Result<(), ConfigurationError> {
        if definition.id.trim().is_empty() {
            return Err(ConfigurationError::EmptyId);
        }
        if definition.dependencies.iter().any(|dep| dep == &definition.id) {
            return Err(ConfigurationError::SelfDependency(definition.id));
        }

        let mut table = self.table.write();
        let id = definition.id.clone();
        let mut record = ModuleRecord::from_definition(definition);
        // Tokens keep counting across a replacement so earlier checks stay stale.
        if let Some(previous) = table.records.get(&id) {
            record.check_token = previous.check_token + 1;
        }
        if table.records.insert(id.clone(), record).is_none() {
            table.order.push(id);
        }
        Ok(())
    }

    /// Checks that adding `definition` keeps the graph closed and acyclic.
    pub fn validate_candidate(&self, definition: &ModuleDefinition) -> Result<(), ConfigurationError> {
        if definition.dependencies.iter().any(|dep| dep == &definition.id) {
            return Err(ConfigurationError::SelfDependency(definition.id.clone()));
        }

        let table = self.table.read();
        for dependency in &definition.dependencies {
            if !table.records.contains_key(dependency) {
                return Err(ConfigurationError::UnknownDependency {
                    module: definition.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        let mut edges: Edges = table
            .edges()
            .into_iter()
            .filter(|(id, _)| *id != definition.id)
            .collect();
        edges.push((definition.id.as_str(), definition.dependencies.as_slice()));

        match graph::find_cycle(&edges) {
            Some(cycle) => Err(ConfigurationError::DependencyCycle(cycle)),
            None => Ok(()),
        }
    }

    pub fn get(&self, id: &str) -> Option<ModuleRecord> {
        self.table.read().records.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.table.read().records.contains_key(id)
    }

    pub fn health_of(&self, id: &str) -> Option<HealthStatus> {
        self.table.read().records.get(id).map(|record| record.health)
    }

    /// All modules in registration order.
    pub fn all(&self) -> Vec<ModuleRecord> {
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

    /// Authoritative write. Invalidates any check still in flight.
    pub fn set_health(&self, id: &str, health: HealthStatus, timestamp: DateTime<Utc>) -> bool {
        let mut table = self.table.write();
        match table.records.get_mut(id) {
            Some(record) => {
                record.check_token += 1;
                record.health = health;
                record.last_check = Some(timestamp);
                if health.is_healthy() {
                    record.error = None;
                }
                true
            }
            None => false,
        }
    }

    /// Records a resolution that failed outside the probe itself.
    pub fn mark_failed(&self, id: &str, error: impl Into<String>, timestamp: DateTime<Utc>) -> bool {
        let mut table = self.table.write();
        match table.records.get_mut(id) {
            Some(record) => {
                record.check_token += 1;
                record.health = HealthStatus::Unhealthy;
                record.error = Some(error.into());
                record.last_check = Some(timestamp);
                true
            }
            None => false,
        }
    }

    pub fn set_status(&self, id: &str, status: ModuleStatus) -> bool {
        let mut table = self.table.write();
        match table.records.get_mut(id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// Issues a fresh check token. Older tokens for this module become stale.
    pub fn begin_check(&self, id: &str) -> Option<u64> {
        let mut table = self.table.write();
        table.records.get_mut(id).map(|record| {
            record.check_token += 1;
            record.check_token
        })
    }

    /// Writes a check result if `token` is still the latest one issued.
    pub fn complete_check(
        &self,
        id: &str,
        token: u64,
        check: ModuleCheck,
        timestamp: DateTime<Utc>,
    ) -> bool {
        let mut table = self.table.write();
        match table.records.get_mut(id) {
            Some(record) if record.check_token == token => {
                record.health = check.health;
                record.error = check.error;
                record.response_time_ms = check.response_time_ms;
                record.details = check.details;
                record.last_check = Some(timestamp);
                true
            }
            _ => false,
        }
    }

    /// Forces every module to `health`, bypassing resolution.
    pub fn force_all(&self, health: HealthStatus, timestamp: DateTime<Utc>) -> usize {
        let mut table = self.table.write();
        for record in table.records.values_mut() {
            record.check_token += 1;
            record.health = health;
            record.error = None;
            record.last_check = Some(timestamp);
        }
        table.records.len()
    }

    /// Ids grouped so that each module's dependencies sit in earlier layers.
    pub fn evaluation_layers(&self) -> Vec<Vec<String>> {
        let table = self.table.read();
        graph::evaluation_layers(&table.edges())
    }

    pub fn ids_with_health(&self, health: HealthStatus) -> HashSet<String> {
        self.table
            .read()
            .records
            .values()
            .filter(|record| record.health == health)
            .map(|record| record.id.clone())
            .collect()
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

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str, deps: &[&str]) -> ModuleDefinition {
        ModuleDefinition::new(id, id).with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_register_and_get() {
        let registry = ModuleRegistry::new();
        registry.register(module("core", &[])).unwrap();
        registry.register(module("sales", &["core"])).unwrap();

        let sales = registry.get("sales").unwrap();
        assert_eq!(sales.dependencies, vec!["core"]);
        assert_eq!(sales.health, HealthStatus::Healthy);
        assert!(sales.last_check.is_none());
        assert_eq!(registry.ids(), vec!["core", "sales"]);
    }

    #[test]
    fn test_duplicate_overwrites_in_place() {
        let registry = ModuleRegistry::new();
        registry.register(module("core", &[])).unwrap();
        registry.register(module("sales", &[])).unwrap();
        registry
            .register(ModuleDefinition::new("core", "Core v2"))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("core").unwrap().name, "Core v2");
        assert_eq!(registry.ids(), vec!["core", "sales"]);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let registry = ModuleRegistry::new();
        let err = registry.register(module("loop", &["loop"])).unwrap_err();
        assert_eq!(err, ConfigurationError::SelfDependency("loop".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_token_is_discarded() {
        let registry = ModuleRegistry::new();
        registry.register(module("core", &[])).unwrap();

        let stale = registry.begin_check("core").unwrap();
        let fresh = registry.begin_check("core").unwrap();
        let now = Utc::now();

        assert!(registry.complete_check("core", fresh, ModuleCheck::new(HealthStatus::Degraded), now));
        assert!(!registry.complete_check("core", stale, ModuleCheck::failed("late"), now));
        assert_eq!(registry.health_of("core"), Some(HealthStatus::Degraded));
        assert!(registry.get("core").unwrap().error.is_none());
    }

    #[test]
    fn test_set_health_invalidates_in_flight_checks() {
        let registry = ModuleRegistry::new();
        registry.register(module("core", &[])).unwrap();

        let token = registry.begin_check("core").unwrap();
        assert!(registry.set_health("core", HealthStatus::Unhealthy, Utc::now()));
        assert!(!registry.complete_check("core", token, ModuleCheck::new(HealthStatus::Healthy), Utc::now()));
        assert_eq!(registry.health_of("core"), Some(HealthStatus::Unhealthy));
    }

    #[test]
    fn test_replacement_discards_checks_begun_before_it() {
        let registry = ModuleRegistry::new();
        registry.register(module("a", &[])).unwrap();
        registry.begin_check("a").unwrap();
        let before = registry.begin_check("a").unwrap();

        registry.register(ModuleDefinition::new("a", "A v2")).unwrap();
        registry.begin_check("a").unwrap();
        let after = registry.begin_check("a").unwrap();
        assert_ne!(before, after);

        let now = Utc::now();
        assert!(registry.complete_check("a", after, ModuleCheck::new(HealthStatus::Healthy), now));
        assert!(!registry.complete_check("a", before, ModuleCheck::failed("late"), now));
        assert_eq!(registry.health_of("a"), Some(HealthStatus::Healthy));
        assert!(registry.get("a").unwrap().error.is_none());
    }

    #[test]
    fn test_validate_candidate() {
        let registry = ModuleRegistry::new();
        registry.register(module("a", &[])).unwrap();
        registry.register(module("b", &["a"])).unwrap();

        assert!(registry.validate_candidate(&module("c", &["b"])).is_ok());
        assert!(matches!(
            registry.validate_candidate(&module("c", &["zzz"])),
            Err(ConfigurationError::UnknownDependency { .. })
        ));
        assert!(matches!(
            registry.validate_candidate(&module("a", &["b"])),
            Err(ConfigurationError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_force_all() {
        let registry = ModuleRegistry::new();
        registry.register(module("a", &[])).unwrap();
        registry.register(module("b", &["a"])).unwrap();
        registry.set_health("a", HealthStatus::Unhealthy, Utc::now());

        assert_eq!(registry.force_all(HealthStatus::Healthy, Utc::now()), 2);
        assert!(registry.all().iter().all(|m| m.health == HealthStatus::Healthy));
        assert!(registry.ids_with_health(HealthStatus::Unhealthy).is_empty());
    }
}
