//! Dependency-aware health monitoring and self-diagnostics for multi-module applications.

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod monitoring;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;

pub use cache::{CacheManager, CacheStats};
pub use collaborators::{
    CacheClearer, Collaborators, IntegrationDiscovery, ModuleRestarter, SecurityPosture, SecuritySnapshot,
    StaleDataCleaner, StaticDiscovery, SystemGauges, ThreatLevel,
};
pub use config::EngineConfig;
pub use diagnostics::{DiagnosticsReport, Recommendation, Severity, StatusReport};
pub use engine::HealthEngine;
pub use error::{ConfigurationError, EngineError, Result};
pub use handlers::routes::create_routes;
pub use health::{
    FilesystemProbe, FnProbe, HealthStatus, IntegrationHealth, ModuleStatus, Probe, ProbeCatalog, ProbeReport,
    SweepSummary, TcpProbe,
};
pub use metrics::{MetricsAggregator, SystemMetrics};
pub use models::ApiResponse;
pub use monitoring::SystemMonitor;
pub use orchestrator::{OrchestratorKind, OrchestratorReport, StepResult};
pub use registry::{
    IntegrationDescriptor, IntegrationRecord, ModuleDefinition, ModuleManifest, ModuleRecord,
};

use axum::{middleware as axum_middleware, Extension, Router};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

/// Reporting routes with request accounting and tracing.
pub fn create_app(engine: HealthEngine) -> Router {
    let routes = Router::new().merge(create_routes()).layer(axum_middleware::from_fn_with_state(
        engine.clone(),
        middleware::accounting::record_requests,
    ));

    middleware::logging::with_tracing(routes).with_state(engine)
}

/// Same as [`create_app`], with diagnostics reports cached in `cache`.
pub fn create_app_with_cache(engine: HealthEngine, cache: CacheManager) -> Router {
    create_app(engine).layer(Extension(cache))
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting health server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
