//! Main entry point for the health server binary

use anyhow::Result;
use health_core::{
    create_app_with_cache, run_server, CacheManager, Collaborators, EngineConfig, FilesystemProbe, HealthEngine,
    IntegrationDescriptor, ModuleManifest, ProbeCatalog, StaticDiscovery, SystemMonitor, TcpProbe,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = EngineConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let manifest = match &config.manifest_path {
        Some(path) => ModuleManifest::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load module manifest: {}", e))?,
        None => {
            info!("Using built-in module manifest");
            ModuleManifest::builtin()
        }
    };

    let mut catalog = ProbeCatalog::new().with_module_probe("core", FilesystemProbe::new([std::env::temp_dir()]));
    let mut descriptors = Vec::with_capacity(config.integrations.len());
    for endpoint in &config.integrations {
        catalog = catalog.with_integration_probe(endpoint.id.clone(), TcpProbe::new(endpoint.address.clone()));
        descriptors.push(IntegrationDescriptor::new(
            endpoint.id.clone(),
            endpoint.name.clone(),
            endpoint.integration_type.clone(),
        ));
    }

    let cache = CacheManager::new("responses", config.cache.clone());
    let collaborators = Collaborators::new()
        .with_discovery(StaticDiscovery::new(descriptors))
        .with_gauges(Arc::new(SystemMonitor::new()))
        .with_cache(Arc::new(cache.clone()))
        .with_stale_data_cleaner(Arc::new(cache.clone()));

    let engine = HealthEngine::bootstrap(config, manifest, catalog, collaborators)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize health engine: {}", e))?;

    info!(
        "Monitoring {} modules and {} integrations",
        engine.modules().len(),
        engine.integrations().len()
    );

    engine.start();

    let app = create_app_with_cache(engine.clone(), cache);
    let served = run_server(app, addr).await;

    engine.cleanup().await;
    served?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };

        format!(
            "{}={},health_core={},tower_http=info",
            env!("CARGO_CRATE_NAME").replace('-', "_"),
            default_level,
            default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
