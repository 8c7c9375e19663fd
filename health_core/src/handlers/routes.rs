//! Route table for the health reporting surface

use super::health::{
    handle_check_integration, handle_check_module, handle_diagnostics, handle_maintenance, handle_metrics,
    handle_recovery, handle_status,
};
use crate::engine::HealthEngine;
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_routes() -> Router<HealthEngine> {
    Router::new()
        .route("/health", get(handle_status))
        .route("/health/diagnostics", get(handle_diagnostics))
        .route("/health/metrics", get(handle_metrics))
        .route("/health/modules/:id", get(handle_check_module))
        .route("/health/integrations/:id", get(handle_check_integration))
        .route("/health/maintenance", post(handle_maintenance))
        .route("/health/recovery", post(handle_recovery))
}
