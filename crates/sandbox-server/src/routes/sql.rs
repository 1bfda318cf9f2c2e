use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use sandbox_auth::{Permission, Principal};
use sandbox_error::RuntimeError;

use crate::auth::require_permission;
use crate::dto::{ExecuteSqlRequest, ResponseEnvelope};
use crate::state::AppState;

/// `execute-sql` (§4.4, §6).
pub async fn execute_sql_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<ExecuteSqlRequest>,
) -> Response {
    match handle(&state, &principal, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: &AppState, principal: &Principal, request: ExecuteSqlRequest) -> Result<Response, RuntimeError> {
    require_permission(principal, Permission::ExecuteSql)?;
    let context = request.context.into_context(principal.workspace_id.clone(), principal.user_id.clone());

    let result = state.sql_executor.execute(&context, &request.query, &request.bindings).await?;
    let metrics = serde_json::to_value(&result.metrics).map_err(|e| RuntimeError::internal(e.to_string()))?;
    let request_id = context.request_id.clone();
    Ok(Json(ResponseEnvelope::success(request_id, metrics, result)).into_response())
}
