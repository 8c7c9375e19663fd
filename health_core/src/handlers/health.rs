//! Health status, diagnostics and corrective action handlers

use crate::{
    cache::CacheManager,
    diagnostics::DiagnosticsReport,
    engine::HealthEngine,
    error::Result,
    health::{HealthStatus, IntegrationHealth},
    models::ApiResponse,
    orchestrator::OrchestratorReport,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::time::Duration;
use tracing::{info, warn};

pub const DIAGNOSTICS_CACHE_KEY: &str = "health:diagnostics";
const DIAGNOSTICS_TTL: Duration = Duration::from_secs(5);

fn status_code(health: HealthStatus) -> StatusCode {
    match health {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn handle_status(State(engine): State<HealthEngine>) -> impl IntoResponse {
    let status = engine.status();

    match status.overall {
        HealthStatus::Healthy => (StatusCode::OK, Json(ApiResponse::success(status))),
        HealthStatus::Degraded => {
            warn!("System health is degraded");
            (StatusCode::OK, Json(ApiResponse::success(status)))
        }
        HealthStatus::Unhealthy => {
            warn!("System health is unhealthy");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::failure(status, "System is unhealthy")),
            )
        }
    }
}

/// Served from the report cache when one is mounted.
pub async fn handle_diagnostics(
    State(engine): State<HealthEngine>,
    cache: Option<Extension<CacheManager>>,
) -> impl IntoResponse {
    if let Some(Extension(cache)) = &cache {
        if let Some(report) = cache.get::<DiagnosticsReport>(DIAGNOSTICS_CACHE_KEY) {
            return Json(ApiResponse::success(report));
        }
    }

    let report = engine.diagnostics();
    if let Some(Extension(cache)) = &cache {
        if let Err(e) = cache.set_with_ttl(DIAGNOSTICS_CACHE_KEY, &report, Some(DIAGNOSTICS_TTL)) {
            warn!("Failed to cache diagnostics report: {}", e);
        }
    }

    Json(ApiResponse::success(report))
}

pub async fn handle_metrics(State(engine): State<HealthEngine>) -> impl IntoResponse {
    Json(ApiResponse::success(engine.refresh_metrics().await))
}

pub async fn handle_check_module(
    State(engine): State<HealthEngine>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    info!("GET /health/modules/{} - Running on-demand check", id);

    let record = engine.check_module(&id).await?;
    Ok((status_code(record.health), Json(ApiResponse::success(record))))
}

pub async fn handle_check_integration(
    State(engine): State<HealthEngine>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    info!("GET /health/integrations/{} - Running on-demand check", id);

    let record = engine.check_integration(&id).await?;
    let code = match record.health {
        IntegrationHealth::Healthy => StatusCode::OK,
        IntegrationHealth::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok((code, Json(ApiResponse::success(record))))
}

pub async fn handle_maintenance(
    State(engine): State<HealthEngine>,
    cache: Option<Extension<CacheManager>>,
) -> impl IntoResponse {
    info!("POST /health/maintenance");
    let report = engine.perform_maintenance().await;
    orchestrator_response(report, cache)
}

pub async fn handle_recovery(
    State(engine): State<HealthEngine>,
    cache: Option<Extension<CacheManager>>,
) -> impl IntoResponse {
    warn!("POST /health/recovery");
    let report = engine.perform_recovery().await;
    orchestrator_response(report, cache)
}

/// Step failures are part of the report, so the response is always 200.
fn orchestrator_response(
    report: OrchestratorReport,
    cache: Option<Extension<CacheManager>>,
) -> Json<ApiResponse<OrchestratorReport>> {
    if let Some(Extension(cache)) = cache {
        cache.remove(DIAGNOSTICS_CACHE_KEY);
    }

    match report.error.clone() {
        Some(error) => Json(ApiResponse::failure(report, error)),
        None => Json(ApiResponse::success(report)),
    }
}
