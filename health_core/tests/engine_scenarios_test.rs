use health_core::{
    Collaborators, EngineConfig, EngineError, HealthEngine, HealthStatus, IntegrationDescriptor, IntegrationHealth,
    ModuleDefinition, ModuleManifest, Probe, ProbeCatalog, ProbeReport, Result, Severity, StaticDiscovery,
    SystemGauges,
};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

struct Reporting {
    status: HealthStatus,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Probe for Reporting {
    async fn probe(&self, _id: &str) -> Result<ProbeReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProbeReport::new(self.status))
    }
}

/// Fails until switched off.
struct Switchable(Arc<AtomicBool>);

#[async_trait::async_trait]
impl Probe for Switchable {
    async fn probe(&self, id: &str) -> Result<ProbeReport> {
        if self.0.load(Ordering::SeqCst) {
            Err(EngineError::probe(id, "service unavailable"))
        } else {
            Ok(ProbeReport::healthy())
        }
    }
}

struct FixedGauges(f64, f64);

impl SystemGauges for FixedGauges {
    fn system_load(&self) -> Option<f64> {
        Some(self.0)
    }

    fn memory_usage_percent(&self) -> Option<f64> {
        Some(self.1)
    }
}

fn module(id: &str, deps: &[&str]) -> ModuleDefinition {
    ModuleDefinition::new(id, id.to_uppercase()).with_dependencies(deps.iter().copied())
}

fn engine(modules: Vec<ModuleDefinition>, catalog: ProbeCatalog, collaborators: Collaborators) -> HealthEngine {
    HealthEngine::new(
        EngineConfig::default(),
        ModuleManifest::new(modules),
        catalog,
        collaborators,
    )
    .unwrap()
}

#[tokio::test]
async fn test_degraded_root_degrades_dependent_without_probing_it() {
    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let catalog = ProbeCatalog::new()
        .with_module_probe(
            "a",
            Reporting {
                status: HealthStatus::Degraded,
                calls: a_calls.clone(),
            },
        )
        .with_module_probe(
            "b",
            Reporting {
                status: HealthStatus::Healthy,
                calls: b_calls.clone(),
            },
        );
    let engine = engine(vec![module("b", &["a"]), module("a", &[])], catalog, Collaborators::new());

    engine.sweep_modules().await;

    assert_eq!(engine.module("a").unwrap().health, HealthStatus::Degraded);
    assert_eq!(engine.module("b").unwrap().health, HealthStatus::Degraded);
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.status().overall, HealthStatus::Degraded);
}

#[tokio::test]
async fn test_quiet_system_has_no_recommendations() {
    let collaborators = Collaborators::new().with_gauges(Arc::new(FixedGauges(50.0, 50.0)));
    let engine = engine(vec![module("core", &[]), module("sales", &["core"])], ProbeCatalog::new(), collaborators);

    engine.sweep_modules().await;
    engine.sweep_integrations().await;
    let metrics = engine.refresh_metrics().await;

    assert_eq!(metrics.system_load, 50.0);
    assert_eq!(metrics.memory_usage, 50.0);
    assert_eq!(metrics.error_rate, 0.0);
    let report = engine.diagnostics();
    assert_eq!(report.status.overall, HealthStatus::Healthy);
    assert!(report.recommendations.is_empty());
}

#[tokio::test]
async fn test_ten_percent_error_rate_is_critical() {
    let engine = engine(vec![module("core", &[])], ProbeCatalog::new(), Collaborators::new());
    for i in 0..100 {
        engine.record_request(i % 10 != 0, 12);
    }

    let report = engine.diagnostics();
    assert_eq!(report.status.metrics.total_requests, 100);
    assert_eq!(report.status.metrics.failed_requests, 10);
    assert_eq!(report.status.metrics.error_rate, 10.0);
    let rule = report
        .recommendations
        .iter()
        .find(|r| r.message == "High error rate detected")
        .unwrap();
    assert_eq!(rule.severity, Severity::Critical);
}

#[tokio::test]
async fn test_failing_integration_makes_system_unhealthy() {
    let catalog = ProbeCatalog::new().with_integration_probe("stripe", Switchable(Arc::new(AtomicBool::new(true))));
    let discovery = StaticDiscovery::new(vec![
        IntegrationDescriptor::new("stripe", "Stripe", "payment"),
        IntegrationDescriptor::new("mailer", "Mailer", "messaging"),
    ]);
    let engine = HealthEngine::bootstrap(
        EngineConfig::default(),
        ModuleManifest::builtin(),
        catalog,
        Collaborators::new().with_discovery(discovery),
    )
    .await
    .unwrap();

    engine.sweep_modules().await;
    let summary = engine.sweep_integrations().await;

    assert_eq!(summary.checked, 2);
    let stripe = engine.integration("stripe").unwrap();
    assert_eq!(stripe.health, IntegrationHealth::Unhealthy);
    assert!(stripe.error.unwrap().contains("service unavailable"));
    assert_eq!(engine.integration("mailer").unwrap().health, IntegrationHealth::Healthy);

    let status = engine.status();
    assert_eq!(status.modules.healthy, 7);
    assert_eq!(status.integrations.unhealthy, 1);
    assert_eq!(status.overall, HealthStatus::Unhealthy);
    let messages: Vec<_> = engine
        .diagnostics()
        .recommendations
        .into_iter()
        .map(|r| r.message)
        .collect();
    assert_eq!(messages, vec!["1 integrations are unhealthy"]);
}

#[tokio::test]
async fn test_recovery_resets_modules_and_counters() {
    let failing = Arc::new(AtomicBool::new(true));
    let catalog = ProbeCatalog::new().with_module_probe("core", Switchable(failing.clone()));
    let engine = engine(
        vec![module("core", &[]), module("sales", &["core"])],
        catalog,
        Collaborators::new(),
    );
    engine.record_request(false, 40);
    engine.record_request(true, 40);

    engine.sweep_modules().await;
    assert_eq!(engine.status().overall, HealthStatus::Unhealthy);

    let report = engine.perform_recovery().await;

    assert!(report.success);
    let status = engine.status();
    assert_eq!(status.overall, HealthStatus::Healthy);
    assert_eq!(status.modules.healthy, 2);
    assert_eq!(status.metrics.total_requests, 0);
}

#[tokio::test]
async fn test_maintenance_only_touches_unhealthy_modules() {
    let failing = Arc::new(AtomicBool::new(true));
    let catalog = ProbeCatalog::new().with_module_probe("core", Switchable(failing.clone()));
    let engine = engine(
        vec![module("core", &[]), module("sales", &["core"]), module("ai", &[])],
        catalog,
        Collaborators::new(),
    );

    engine.sweep_modules().await;
    assert_eq!(engine.module("core").unwrap().health, HealthStatus::Unhealthy);
    assert_eq!(engine.module("sales").unwrap().health, HealthStatus::Degraded);

    failing.store(false, Ordering::SeqCst);
    let report = engine.perform_maintenance().await;

    assert!(report.success, "{:?}", report.error);
    assert_eq!(engine.modules().len(), 3);
    assert_eq!(engine.module("core").unwrap().health, HealthStatus::Healthy);
    assert_eq!(engine.module("sales").unwrap().health, HealthStatus::Degraded);
    assert_eq!(engine.module("ai").unwrap().health, HealthStatus::Healthy);

    engine.sweep_modules().await;
    assert_eq!(engine.status().overall, HealthStatus::Healthy);
}

async fn engine_with_failing_stripe() -> HealthEngine {
    let catalog = ProbeCatalog::new().with_integration_probe("stripe", Switchable(Arc::new(AtomicBool::new(true))));
    let discovery = StaticDiscovery::new(vec![
        IntegrationDescriptor::new("stripe", "Stripe", "payment"),
        IntegrationDescriptor::new("mailer", "Mailer", "messaging"),
    ]);
    let collaborators = Collaborators::new()
        .with_discovery(discovery)
        .with_gauges(Arc::new(FixedGauges(62.0, 48.0)));
    let engine = HealthEngine::bootstrap(EngineConfig::default(), ModuleManifest::builtin(), catalog, collaborators)
        .await
        .unwrap();
    engine.sweep_integrations().await;
    engine
}

#[tokio::test]
async fn test_recovery_leaves_integrations_and_gauges_alone() {
    let engine = engine_with_failing_stripe().await;
    engine.refresh_metrics().await;
    let before = engine.integration("stripe").unwrap();

    let report = engine.perform_recovery().await;

    assert!(report.success);
    assert_eq!(engine.integration("stripe").unwrap(), before);
    assert_eq!(engine.integration("mailer").unwrap().health, IntegrationHealth::Healthy);
    let status = engine.status();
    assert_eq!(status.modules.unhealthy, 0);
    assert_eq!(status.integrations.unhealthy, 1);
    assert_eq!(status.overall, HealthStatus::Unhealthy);
    assert_eq!(status.metrics.system_load, 62.0);
    assert_eq!(status.metrics.memory_usage, 48.0);
}

#[tokio::test]
async fn test_maintenance_keeps_every_integration() {
    let engine = engine_with_failing_stripe().await;
    let ids: Vec<_> = engine.integrations().into_iter().map(|i| i.id).collect();

    let report = engine.perform_maintenance().await;

    assert!(report.success, "{:?}", report.error);
    let after: Vec<_> = engine.integrations().into_iter().map(|i| i.id).collect();
    assert_eq!(after, ids);
    assert_eq!(engine.integration("stripe").unwrap().health, IntegrationHealth::Unhealthy);
    assert_eq!(engine.modules().len(), 7);
}

#[tokio::test]
async fn test_on_demand_check_returns_fresh_record() {
    let failing = Arc::new(AtomicBool::new(false));
    let catalog = ProbeCatalog::new().with_module_probe("core", Switchable(failing.clone()));
    let engine = engine(vec![module("core", &[])], catalog, Collaborators::new());

    failing.store(true, Ordering::SeqCst);
    let record = engine.check_module("core").await.unwrap();

    assert_eq!(record.health, HealthStatus::Unhealthy);
    assert!(record.last_check.is_some());
    assert!(record.error.is_some());
}

#[tokio::test]
async fn test_engine_from_manifest_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[modules]]
id = "core"
name = "Core"

[[modules]]
id = "billing"
name = "Billing"
status = "inactive"
dependencies = ["core"]
"#
    )
    .unwrap();

    let manifest = ModuleManifest::load(file.path()).unwrap();
    let engine = engine(manifest.modules, ProbeCatalog::new(), Collaborators::new());

    let summary = engine.sweep_modules().await;
    assert_eq!(summary.checked, 2);
    assert_eq!(summary.healthy, 2);
}
