//! Feeds every completed request into the engine's metrics

use crate::engine::HealthEngine;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// 503 and 404 are how the reporting routes answer for an unhealthy or
/// unknown entity. Only other 5xx responses are faults of this server.
pub fn is_server_fault(status: StatusCode) -> bool {
    status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE
}

/// Counts a request as failed when it ended in a server fault.
pub async fn record_requests(State(engine): State<HealthEngine>, request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    let success = !is_server_fault(response.status());
    engine.record_request(success, start.elapsed().as_millis() as u64);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_answers_are_not_faults() {
        assert!(!is_server_fault(StatusCode::OK));
        assert!(!is_server_fault(StatusCode::NOT_FOUND));
        assert!(!is_server_fault(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_server_fault(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_server_fault(StatusCode::GATEWAY_TIMEOUT));
    }
}
