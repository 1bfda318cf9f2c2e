use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: Vec<ConnectionHealth>,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ConnectionHealth {
    pub connection_id: String,
    pub vendor: String,
}

/// `health` (§6). Reports process liveness plus a summary of the
/// registered connection pools — never probes each pool live, since a
/// slow/unreachable data source shouldn't make the health check itself
/// time out.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state
        .registry
        .summaries()
        .into_iter()
        .map(|(connection_id, vendor)| ConnectionHealth { connection_id, vendor: format!("{vendor:?}").to_lowercase() })
        .collect();

    (StatusCode::OK, Json(HealthResponse { status: "healthy", connections, version: env!("CARGO_PKG_VERSION") }))
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    pub operations: &'static [&'static str],
    pub execution_mode: String,
    pub environment: String,
}

const OPERATIONS: &[&str] = &[
    "execute-sql",
    "execute-code",
    "create-visualization",
    "list-connections",
    "create-connection",
    "delete-connection",
    "test-connection",
    "sync-schema",
    "get-table-samples",
    "health",
    "capabilities",
];

/// `capabilities` (§6): advertises the fixed operation set and the
/// current execution mode/environment, so a caller can tell a strict
/// deployment from a permissive one without guessing.
pub async fn capabilities_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.load();
    Json(CapabilitiesResponse {
        operations: OPERATIONS,
        execution_mode: format!("{:?}", config.execution_mode).to_lowercase(),
        environment: format!("{:?}", config.environment).to_lowercase(),
    })
}
