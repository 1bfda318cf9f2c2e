use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use sandbox_auth::Principal;
use sandbox_context::ExecutionMetrics;
use sandbox_db::ConnectionDescriptor;
use sandbox_error::RuntimeError;

use crate::dto::{CreateConnectionRequest, ResponseEnvelope, SyncSchemaRequest, TableSamplesRequest, TestConnectionRequest};
use crate::state::AppState;

/// `list-connections` (§6). Gated only on authentication — connection
/// administration has no dedicated entry in the closed `Permission` set.
pub async fn list_connections_handler(State(state): State<AppState>, Extension(_principal): Extension<Principal>) -> Response {
    let mut metrics = ExecutionMetrics::start();
    let descriptors = state.registry.list();
    let _ = metrics.complete();
    respond(descriptors, metrics)
}

/// `create-connection` (§6).
pub async fn create_connection_handler(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Json(request): Json<CreateConnectionRequest>,
) -> Response {
    match run(&state, |state| state.registry.create(request)).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// `delete-connection` (§6).
pub async fn delete_connection_handler(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(connection_id): Path<String>,
) -> Response {
    let mut metrics = ExecutionMetrics::start();
    match state.registry.delete(&connection_id).await {
        Ok(()) => {
            let _ = metrics.complete();
            respond(serde_json::json!({"deleted": connection_id}), metrics)
        }
        Err(err) => err.into_response(),
    }
}

/// `test-connection` (§6, §8: "succeeds iff `open(d)` succeeds,
/// independent of the registry").
pub async fn test_connection_handler(
    State(_state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Json(request): Json<TestConnectionRequest>,
) -> Response {
    let mut metrics = ExecutionMetrics::start();
    let descriptor = ConnectionDescriptor::from_input(request.descriptor);
    match sandbox_db::ConnectionRegistry::test(&descriptor).await {
        Ok(()) => {
            let _ = metrics.complete();
            respond(serde_json::json!({"reachable": true}), metrics)
        }
        Err(err) => err.into_response(),
    }
}

/// `sync-schema` (§6).
pub async fn sync_schema_handler(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(connection_id): Path<String>,
    Json(request): Json<SyncSchemaRequest>,
) -> Response {
    match run(&state, |state| state.registry.sync_schema(&connection_id, request.schema.as_deref())).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// `get-table-samples` (§6).
pub async fn table_samples_handler(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Path(connection_id): Path<String>,
    Json(request): Json<TableSamplesRequest>,
) -> Response {
    match run(&state, |state| state.registry.table_samples(&connection_id, &request.table, request.limit)).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn run<T, F, Fut>(state: &AppState, f: F) -> Result<Response, RuntimeError>
where
    T: serde::Serialize,
    F: FnOnce(&AppState) -> Fut,
    Fut: std::future::Future<Output = Result<T, RuntimeError>>,
{
    let mut metrics = ExecutionMetrics::start();
    let body = f(state).await?;
    metrics.complete()?;
    Ok(respond(body, metrics))
}

fn respond<T: serde::Serialize>(body: T, metrics: ExecutionMetrics) -> Response {
    let metrics_value = serde_json::to_value(&metrics).unwrap_or(serde_json::Value::Null);
    Json(ResponseEnvelope::success(uuid::Uuid::new_v4().to_string(), metrics_value, body)).into_response()
}
