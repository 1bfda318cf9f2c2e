use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use sandbox_auth::{Permission, Principal};
use sandbox_error::RuntimeError;

use crate::auth::require_permission;
use crate::dto::{ExecuteCodeRequest, ResponseEnvelope};
use crate::state::AppState;

/// `execute-code` (§4.5, §4.6, §6).
pub async fn execute_code_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<ExecuteCodeRequest>,
) -> Response {
    match handle(&state, &principal, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: &AppState, principal: &Principal, request: ExecuteCodeRequest) -> Result<Response, RuntimeError> {
    require_permission(principal, Permission::ExecuteCode)?;
    let context = request.context.into_context(principal.workspace_id.clone(), principal.user_id.clone());

    let config = state.config.load();
    let outcome = state
        .code_runner
        .run(&context, &request.code, request.input_data, request.variables, &config.security.allowed_imports)
        .await?;

    let metrics = serde_json::to_value(&outcome.metrics).map_err(|e| RuntimeError::internal(e.to_string()))?;
    let request_id = context.request_id.clone();
    Ok(Json(ResponseEnvelope::success(request_id, metrics, outcome)).into_response())
}
