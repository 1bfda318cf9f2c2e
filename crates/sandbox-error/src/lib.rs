//! Unified error taxonomy for the execution sandbox service.
//!
//! Every crate in this workspace returns `Result<T, RuntimeError>` at its
//! public boundary. `RuntimeError` carries exactly the taxonomy tags
//! described by the service specification: `validation`, `auth_failed`,
//! `auth_denied`, `policy_violation`, `connection_failed`, `pool_exhausted`,
//! `query_error`, `timeout`, `resource_limit`, `sandbox_error`, `internal`.

#![allow(missing_docs)]

#[cfg(feature = "axum-compat")]
mod http;

#[cfg(feature = "axum-compat")]
pub use http::ErrorResponse;

use serde::Serialize;

/// Resource class exceeded by a `resource_limit` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Memory,
    OutputSize,
    RowCount,
}

/// The unified error type returned from every sandbox operation.
///
/// Variants map one-to-one onto the taxonomy table in the service
/// specification. `details` never contains secret material or full user
/// payloads — at most a bounded preview (see [`RuntimeError::query_error`]).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("validation failed: {message}")]
    Validation { field: Option<String>, message: String },

    #[error("authentication failed")]
    AuthFailed { reason: String },

    #[error("principal lacks permission for this operation")]
    AuthDenied { required_permission: String },

    #[error("rejected by policy: {category}")]
    PolicyViolation { category: String },

    #[error("could not open connection: {reason}")]
    ConnectionFailed { reason: String },

    #[error("connection pool exhausted waiting for a connection")]
    PoolExhausted,

    #[error("query execution error")]
    QueryError { sanitized_message: String, query_preview: Option<String> },

    #[error("operation exceeded its deadline")]
    Timeout,

    #[error("resource limit exceeded: {resource:?}")]
    ResourceLimit { resource: ResourceClass },

    #[error("sandbox worker failed: {reason}")]
    SandboxError { reason: String },

    #[error("internal error")]
    Internal { message: String },
}

impl RuntimeError {
    /// Stable machine-readable code, as required by the "user-visible
    /// behavior" propagation policy: callers key off this, not `Display`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::AuthFailed { .. } => "auth_failed",
            Self::AuthDenied { .. } => "auth_denied",
            Self::PolicyViolation { .. } => "policy_violation",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::PoolExhausted => "pool_exhausted",
            Self::QueryError { .. } => "query_error",
            Self::Timeout => "timeout",
            Self::ResourceLimit { .. } => "resource_limit",
            Self::SandboxError { .. } => "sandbox_error",
            Self::Internal { .. } => "internal",
        }
    }

    /// Status bucket for the response envelope (`success|error|timeout|resource_limit`).
    #[must_use]
    pub const fn response_status(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ResourceLimit { .. } => "resource_limit",
            _ => "error",
        }
    }

    /// Build a `query_error` with a bounded (≤200 char) query preview, per
    /// §7's allowance that a SQL validation preview "may appear because it
    /// is already known to the caller". The raw query is never stored
    /// beyond this truncated preview.
    #[must_use]
    pub fn query_error(sanitized_message: impl Into<String>, query: &str) -> Self {
        let preview: String = query.chars().take(200).collect();
        Self::QueryError {
            sanitized_message: sanitized_message.into(),
            query_preview: Some(preview),
        }
    }

    #[must_use]
    pub fn policy_violation(category: impl Into<String>) -> Self {
        Self::PolicyViolation { category: category.into() }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { field: None, message: message.into() }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_is_stable_per_variant() {
        assert_eq!(RuntimeError::Timeout.error_code(), "timeout");
        assert_eq!(
            RuntimeError::ResourceLimit { resource: ResourceClass::Memory }.error_code(),
            "resource_limit"
        );
    }

    #[test]
    fn query_preview_is_truncated_to_200_chars() {
        let long_query = "a".repeat(500);
        let err = RuntimeError::query_error("syntax error", &long_query);
        match err {
            RuntimeError::QueryError { query_preview: Some(p), .. } => assert_eq!(p.len(), 200),
            _ => panic!("expected QueryError"),
        }
    }

    #[test]
    fn response_status_buckets_timeout_and_resource_limit_separately() {
        assert_eq!(RuntimeError::Timeout.response_status(), "timeout");
        assert_eq!(
            RuntimeError::ResourceLimit { resource: ResourceClass::OutputSize }.response_status(),
            "resource_limit"
        );
        assert_eq!(RuntimeError::PoolExhausted.response_status(), "error");
    }
}
