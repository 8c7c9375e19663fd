//! Engine error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Registration-time problems with the module graph. Fatal to startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Entity id cannot be empty")]
    EmptyId,

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Module '{0}' depends on itself")]
    SelfDependency(String),

    #[error("Module '{module}' depends on unknown module '{dependency}'")]
    UnknownDependency { module: String, dependency: String },

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Probe failed for '{id}': {message}")]
    ProbeFailure { id: String, message: String },

    #[error("Probe for '{id}' timed out after {timeout_ms}ms")]
    ProbeTimeout { id: String, timeout_ms: u64 },

    #[error("{step} failed: {message}")]
    OrchestratorStep { step: String, message: String },

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn probe(id: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::ProbeFailure {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        EngineError::Collaborator(message.into())
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            EngineError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            EngineError::Configuration(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            EngineError::Settings(err) => {
                tracing::error!("Settings error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Settings error".to_string())
            }
            EngineError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            EngineError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            other => {
                tracing::error!("Engine error: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = ConfigurationError::DependencyCycle(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(err.to_string(), "Dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = EngineError::NotFound("module 'x'".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = EngineError::from(ConfigurationError::EmptyId).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = EngineError::probe("sales", "boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
