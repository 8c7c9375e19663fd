//! Request tracing for the reporting routes

use super::accounting::is_server_fault;
use axum::body::Body;
use axum::Router;
use http::{Request, Response};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

/// Wraps every route of `router` in a `health_request` span.
pub fn with_tracing<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            info_span!(
                "health_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::debug!("{} {}", request.method(), request.uri().path());
        })
        .on_response(|response: &Response<Body>, latency: Duration, _span: &Span| {
            let status = response.status();
            if is_server_fault(status) {
                tracing::error!(status = status.as_u16(), latency_ms = latency.as_millis() as u64, "request failed");
            } else if status.is_client_error() || status == http::StatusCode::SERVICE_UNAVAILABLE {
                tracing::warn!(status = status.as_u16(), latency_ms = latency.as_millis() as u64, "request completed");
            } else {
                tracing::info!(status = status.as_u16(), latency_ms = latency.as_millis() as u64, "request completed");
            }
        })
        .on_failure(|error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
            tracing::debug!(latency_ms = latency.as_millis() as u64, error = ?error, "request classified as failure");
        });

    router.layer(layer)
}
