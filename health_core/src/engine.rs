//! The health engine service the embedding application holds on to

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticsEngine, DiagnosticsReport, StatusReport};
use crate::error::{EngineError, Result};
use crate::health::{DependencyResolver, ModuleStatus, ProbeCatalog, SweepSummary};
use crate::metrics::{MetricsAggregator, SystemMetrics};
use crate::orchestrator::{MaintenanceOrchestrator, OrchestratorReport, RecoveryOrchestrator};
use crate::registry::{
    IntegrationDescriptor, IntegrationRecord, IntegrationRegistry, ModuleDefinition, ModuleManifest,
    ModuleRecord, ModuleRegistry,
};
use crate::scheduler::{HealthScheduler, SchedulerHandle, SchedulerIntervals, SweepGuard, SweepTarget};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Constructed once at startup and shared by cloning. All clones see the
/// same registries, metrics and scheduler.
#[derive(Debug, Clone)]
pub struct HealthEngine {
    config: Arc<EngineConfig>,
    modules: ModuleRegistry,
    integrations: IntegrationRegistry,
    resolver: DependencyResolver,
    metrics: MetricsAggregator,
    diagnostics: DiagnosticsEngine,
    maintenance: MaintenanceOrchestrator,
    recovery: RecoveryOrchestrator,
    collaborators: Collaborators,
    module_guard: SweepGuard,
    integration_guard: SweepGuard,
    metrics_guard: SweepGuard,
    scheduler: Arc<Mutex<Option<SchedulerHandle>>>,
}

impl HealthEngine {
    /// Validates configuration and the manifest, then seeds the module
    /// registry. Integrations are added by [`Self::discover_integrations`].
    pub fn new(
        config: EngineConfig,
        manifest: ModuleManifest,
        catalog: ProbeCatalog,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        manifest.validate()?;

        let modules = ModuleRegistry::new();
        for definition in manifest.modules {
            modules.register(definition)?;
        }
        let integrations = IntegrationRegistry::new();

        let resolver = DependencyResolver::new(
            modules.clone(),
            integrations.clone(),
            Arc::new(catalog),
            config.scheduler.probe_timeout(),
        );
        let metrics = MetricsAggregator::new()
            .with_gauges(collaborators.gauges.clone())
            .with_security(collaborators.security.clone());
        let diagnostics = DiagnosticsEngine::new(
            modules.clone(),
            integrations.clone(),
            metrics.clone(),
            config.thresholds.clone(),
        );
        let maintenance = MaintenanceOrchestrator::new(
            modules.clone(),
            resolver.clone(),
            metrics.clone(),
            collaborators.clone(),
            config.maintenance.stale_data_retention_days,
        );
        let recovery = RecoveryOrchestrator::new(modules.clone(), metrics.clone(), collaborators.clone());

        info!(
            modules = modules.len(),
            "Health engine initialized with {:?}",
            collaborators
        );

        Ok(Self {
            config: Arc::new(config),
            modules,
            integrations,
            resolver,
            metrics,
            diagnostics,
            maintenance,
            recovery,
            collaborators,
            module_guard: SweepGuard::new("modules"),
            integration_guard: SweepGuard::new("integrations"),
            metrics_guard: SweepGuard::new("metrics"),
            scheduler: Arc::new(Mutex::new(None)),
        })
    }

    /// [`Self::new`] followed by integration discovery. A failing discovery
    /// collaborator leaves the integration registry empty.
    pub async fn bootstrap(
        config: EngineConfig,
        manifest: ModuleManifest,
        catalog: ProbeCatalog,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let engine = Self::new(config, manifest, catalog, collaborators)?;
        if let Err(e) = engine.discover_integrations().await {
            warn!("Integration discovery failed: {}", e);
        }
        Ok(engine)
    }

    pub async fn discover_integrations(&self) -> Result<usize> {
        let Some(discovery) = &self.collaborators.discovery else {
            return Ok(0);
        };

        let descriptors = discovery.list_integrations().await?;
        let count = descriptors.len();
        for descriptor in descriptors {
            self.register_integration(descriptor)?;
        }
        info!("Discovered {} integrations", count);
        Ok(count)
    }

    pub fn register_integration(&self, descriptor: IntegrationDescriptor) -> Result<bool> {
        let id = descriptor.id.clone();
        let replaced = self.integrations.register(descriptor)?;
        if replaced {
            warn!(integration = %id, "Integration registered twice, keeping the latest entry");
        }
        Ok(replaced)
    }

    /// Adds or replaces a module after checking it keeps the graph closed
    /// and acyclic.
    pub fn register_module(&self, definition: ModuleDefinition) -> Result<()> {
        self.modules.validate_candidate(&definition)?;
        let id = definition.id.clone();
        self.modules.register(definition)?;
        info!(module = %id, "Module registered");
        Ok(())
    }

    pub fn set_module_status(&self, id: &str, status: ModuleStatus) -> Result<()> {
        if self.modules.set_status(id, status) {
            info!(module = id, "Module marked {:?}", status);
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("module '{}'", id)))
        }
    }

    /// Starts the periodic cycles. Calling it again while running is a no-op.
    /// The cycles hold a clone of the engine, so they keep running after
    /// every other clone is dropped until [`Self::cleanup`] stops them.
    pub fn start(&self) {
        let mut scheduler = self.scheduler.lock();
        if scheduler.is_some() {
            warn!("Health scheduler already running");
            return;
        }
        let intervals = SchedulerIntervals::from(&self.config.scheduler);
        *scheduler = Some(HealthScheduler::spawn(Arc::new(self.clone()), intervals));
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    pub fn status(&self) -> StatusReport {
        self.diagnostics.status()
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        self.diagnostics.diagnostics()
    }

    pub async fn perform_maintenance(&self) -> OrchestratorReport {
        let _modules = self.module_guard.begin().await;
        let _metrics = self.metrics_guard.begin().await;
        self.maintenance.run().await
    }

    pub async fn perform_recovery(&self) -> OrchestratorReport {
        let _modules = self.module_guard.begin().await;
        let _metrics = self.metrics_guard.begin().await;
        self.recovery.run().await
    }

    pub fn record_request(&self, success: bool, duration_ms: u64) {
        self.metrics.record_request(success, duration_ms);
    }

    /// Runs a module sweep, waiting for any sweep or orchestrator in progress.
    pub async fn sweep_modules(&self) -> SweepSummary {
        let _running = self.module_guard.begin().await;
        self.resolver.sweep_modules().await
    }

    pub async fn try_sweep_modules(&self) -> Option<SweepSummary> {
        let _running = self.module_guard.try_begin()?;
        Some(self.resolver.sweep_modules().await)
    }

    pub async fn sweep_integrations(&self) -> SweepSummary {
        let _running = self.integration_guard.begin().await;
        self.resolver.sweep_integrations().await
    }

    pub async fn try_sweep_integrations(&self) -> Option<SweepSummary> {
        let _running = self.integration_guard.try_begin()?;
        Some(self.resolver.sweep_integrations().await)
    }

    pub async fn refresh_metrics(&self) -> SystemMetrics {
        let _running = self.metrics_guard.begin().await;
        self.metrics.snapshot().await
    }

    pub async fn try_refresh_metrics(&self) -> Option<SystemMetrics> {
        let _running = self.metrics_guard.try_begin()?;
        Some(self.metrics.snapshot().await)
    }

    pub fn metrics(&self) -> SystemMetrics {
        self.metrics.current()
    }

    /// Resolves one module outside the schedule and returns its record.
    pub async fn check_module(&self, id: &str) -> Result<ModuleRecord> {
        self.resolver.resolve_module(id).await?;
        self.module(id)
            .ok_or_else(|| EngineError::NotFound(format!("module '{}'", id)))
    }

    pub async fn check_integration(&self, id: &str) -> Result<IntegrationRecord> {
        self.resolver.resolve_integration(id).await?;
        self.integration(id)
            .ok_or_else(|| EngineError::NotFound(format!("integration '{}'", id)))
    }

    pub fn module(&self, id: &str) -> Option<ModuleRecord> {
        self.modules.get(id)
    }

    pub fn modules(&self) -> Vec<ModuleRecord> {
        self.modules.all()
    }

    pub fn integration(&self, id: &str) -> Option<IntegrationRecord> {
        self.integrations.get(id)
    }

    pub fn integrations(&self) -> Vec<IntegrationRecord> {
        self.integrations.all()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stops the scheduler and empties both registries.
    pub async fn cleanup(&self) {
        let handle = self.scheduler.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        self.modules.clear();
        self.integrations.clear();
        info!("Health engine cleaned up");
    }
}

#[async_trait::async_trait]
impl SweepTarget for HealthEngine {
    async fn module_sweep(&self) -> Option<SweepSummary> {
        self.try_sweep_modules().await
    }

    async fn integration_sweep(&self) -> Option<SweepSummary> {
        self.try_sweep_integrations().await
    }

    async fn metrics_tick(&self) -> bool {
        self.try_refresh_metrics().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StaticDiscovery;
    use crate::error::ConfigurationError;
    use crate::health::HealthStatus;
    use std::time::Duration;

    fn engine() -> HealthEngine {
        HealthEngine::new(
            EngineConfig::default(),
            ModuleManifest::builtin(),
            ProbeCatalog::new(),
            Collaborators::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_seeds_builtin_modules() {
        let engine = engine();
        assert_eq!(engine.modules().len(), 7);
        assert_eq!(engine.status().overall, HealthStatus::Healthy);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_invalid_manifest_is_fatal() {
        let manifest = ModuleManifest::new(vec![
            ModuleDefinition::new("a", "A").with_dependencies(["b"]),
            ModuleDefinition::new("b", "B").with_dependencies(["a"]),
        ]);
        let result = HealthEngine::new(
            EngineConfig::default(),
            manifest,
            ProbeCatalog::new(),
            Collaborators::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::Configuration(ConfigurationError::DependencyCycle(_)))
        ));
    }

    #[test]
    fn test_register_module_validates_graph() {
        let engine = engine();
        assert!(engine
            .register_module(ModuleDefinition::new("billing", "Billing").with_dependencies(["banking"]))
            .is_ok());
        assert!(matches!(
            engine.register_module(ModuleDefinition::new("x", "X").with_dependencies(["nope"])),
            Err(EngineError::Configuration(ConfigurationError::UnknownDependency { .. }))
        ));
        assert!(matches!(
            engine.register_module(ModuleDefinition::new("core", "Core").with_dependencies(["reporting"])),
            Err(EngineError::Configuration(ConfigurationError::DependencyCycle(_)))
        ));
        assert_eq!(engine.module("core").unwrap().dependencies.len(), 0);
    }

    #[test]
    fn test_set_module_status_keeps_health() {
        let engine = engine();
        engine.set_module_status("ai", ModuleStatus::Inactive).unwrap();
        let ai = engine.module("ai").unwrap();
        assert_eq!(ai.status, ModuleStatus::Inactive);
        assert_eq!(ai.health, HealthStatus::Healthy);
        assert!(matches!(
            engine.set_module_status("ghost", ModuleStatus::Active),
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_discovers_integrations() {
        let discovery = StaticDiscovery::new(vec![
            IntegrationDescriptor::new("stripe", "Stripe", "payment"),
            IntegrationDescriptor::new("twilio", "Twilio", "messaging"),
            IntegrationDescriptor::new("stripe", "Stripe EU", "payment"),
        ]);
        let engine = HealthEngine::bootstrap(
            EngineConfig::default(),
            ModuleManifest::builtin(),
            ProbeCatalog::new(),
            Collaborators::new().with_discovery(discovery),
        )
        .await
        .unwrap();

        assert_eq!(engine.integrations().len(), 2);
        assert_eq!(engine.integration("stripe").unwrap().name, "Stripe EU");
    }

    #[tokio::test]
    async fn test_try_sweep_skips_while_maintenance_holds_guard() {
        let engine = engine();
        let held = engine.module_guard.begin().await;
        assert!(engine.try_sweep_modules().await.is_none());
        drop(held);
        assert_eq!(engine.try_sweep_modules().await.unwrap().checked, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_cleanup() {
        let engine = engine();
        engine.start();
        engine.start();
        assert!(engine.is_running());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.module("core").unwrap().last_check.is_some());

        engine.cleanup().await;
        assert!(!engine.is_running());
        assert!(engine.modules().is_empty());
        assert!(engine.integrations().is_empty());
    }

    #[tokio::test]
    async fn test_check_unknown_module() {
        let engine = engine();
        assert!(matches!(engine.check_module("ghost").await, Err(EngineError::NotFound(_))));
        assert!(matches!(
            engine.check_integration("ghost").await,
            Err(EngineError::NotFound(_))
        ));
    }
}
