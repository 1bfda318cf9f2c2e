use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use sandbox_auth::{Permission, Principal};
use sandbox_context::ExecutionContext;
use sandbox_db::{CanonicalType, ColumnSchema, Row, Value};
use sandbox_error::RuntimeError;
use sandbox_viz::ChartKind;

use crate::auth::require_permission;
use crate::dto::{CreateVisualizationRequest, ResponseEnvelope};
use crate::state::AppState;

/// `create-visualization` (§4.7, §6).
pub async fn create_visualization_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateVisualizationRequest>,
) -> Response {
    match handle(&state, &principal, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: &AppState, principal: &Principal, request: CreateVisualizationRequest) -> Result<Response, RuntimeError> {
    require_permission(principal, Permission::ProduceVisualization)?;

    let (context, envelope) = match request {
        CreateVisualizationRequest::CodeDriven { context, spec } => {
            let context = context.into_context(principal.workspace_id.clone(), principal.user_id.clone());
            let envelope = state.viz_adapter.accept_code_driven_spec(spec)?;
            (context, envelope)
        }
        CreateVisualizationRequest::FromData { context, data, instruction, chart_type, title } => {
            let context: ExecutionContext = context.into_context(principal.workspace_id.clone(), principal.user_id.clone());
            let (columns, rows) = tabular_from_json(data);
            let envelope = state.viz_adapter.generate(
                &context,
                &columns,
                rows,
                instruction.as_deref(),
                chart_type.unwrap_or(ChartKind::Auto),
                title.as_deref(),
            )?;
            (context, envelope)
        }
    };

    let metrics = serde_json::to_value(&envelope.metrics).map_err(|e| RuntimeError::internal(e.to_string()))?;
    Ok(Json(ResponseEnvelope::success(context.request_id.clone(), metrics, envelope)).into_response())
}

/// Converts caller-supplied JSON records into the canonical `(columns,
/// rows)` shape the adapter expects. Column order follows `serde_json`'s
/// (sorted) key order of the first record; a key missing from a later
/// record becomes `Value::Null` for that row.
fn tabular_from_json(data: Vec<serde_json::Map<String, serde_json::Value>>) -> (Vec<ColumnSchema>, Vec<Row>) {
    let Some(first) = data.first() else {
        return (Vec::new(), Vec::new());
    };

    let names: Vec<String> = first.keys().cloned().collect();
    let columns = names
        .iter()
        .map(|name| {
            let declared_type = first.get(name).map(json_canonical_type).unwrap_or(CanonicalType::Null);
            ColumnSchema { name: name.clone(), declared_type, masked: false }
        })
        .collect();

    let rows = data
        .into_iter()
        .map(|mut record| {
            let values = names.iter().map(|name| record.remove(name).map(json_to_value).unwrap_or(Value::Null)).collect();
            Row { values }
        })
        .collect();

    (columns, rows)
}

fn json_canonical_type(value: &serde_json::Value) -> CanonicalType {
    match value {
        serde_json::Value::Null => CanonicalType::Null,
        serde_json::Value::Bool(_) => CanonicalType::Bool,
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => CanonicalType::Int,
        serde_json::Value::Number(_) => CanonicalType::Float,
        serde_json::Value::String(_) => CanonicalType::Text,
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => CanonicalType::Json,
    }
}

fn json_to_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) if n.is_i64() => Value::Int(n.as_i64().unwrap_or_default()),
        serde_json::Value::Number(n) if n.is_u64() => Value::Int(n.as_u64().unwrap_or_default() as i64),
        serde_json::Value::Number(n) => Value::Float(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Value::Text(s),
        other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => Value::Json(other),
    }
}
