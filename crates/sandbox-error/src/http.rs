use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::RuntimeError;

/// HTTP error body, consistent across every route in `sandbox-server`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error_code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn new(error: &RuntimeError, message: impl Into<String>) -> Self {
        Self {
            status: error.response_status(),
            error_code: error.error_code(),
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for RuntimeError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
            Self::AuthFailed { .. } => (StatusCode::UNAUTHORIZED, "invalid or expired credential".to_string()),
            Self::AuthDenied { .. } => (StatusCode::FORBIDDEN, "permission denied".to_string()),
            Self::PolicyViolation { category } => {
                (StatusCode::BAD_REQUEST, format!("rejected by policy: {category}"))
            }
            Self::ConnectionFailed { .. } => {
                (StatusCode::BAD_GATEWAY, "could not connect to data source".to_string())
            }
            Self::PoolExhausted => (StatusCode::SERVICE_UNAVAILABLE, "connection pool exhausted".to_string()),
            Self::QueryError { sanitized_message, .. } => (StatusCode::UNPROCESSABLE_ENTITY, sanitized_message.clone()),
            Self::Timeout => (StatusCode::GATEWAY_TIMEOUT, "deadline exceeded".to_string()),
            Self::ResourceLimit { resource } => {
                (StatusCode::INSUFFICIENT_STORAGE, format!("resource limit exceeded: {resource:?}"))
            }
            Self::SandboxError { reason } => (StatusCode::INTERNAL_SERVER_ERROR, reason.clone()),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred".to_string()),
        };

        let body = ErrorResponse::new(&self, message);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn internal_errors_never_leak_message_detail_to_body() {
        let err = RuntimeError::internal("leaked secret detail that must not reach the caller");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn policy_violation_maps_to_bad_request() {
        let err = RuntimeError::policy_violation("blocked_import");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
