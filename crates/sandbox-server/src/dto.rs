//! Request/response DTOs for the JSON-over-HTTP transport (§6).
//!
//! Every operation body carries an embedded execution context; handlers
//! split it into a `sandbox_context::ExecutionContext` via [`ContextInput::into_context`]
//! before calling into the core crates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sandbox_context::ExecutionContext;
use sandbox_db::{ConnectionDescriptorInput, Value};
use sandbox_viz::ChartKind;

/// The execution-context portion shared by every operation body (§3).
/// All fields are optional; the service fills in a request id and the
/// workspace/principal identity supplied by [`crate::auth`] when absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextInput {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub max_rows: Option<u64>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub output_kb: Option<u64>,
    #[serde(default)]
    pub streaming_preferred: bool,
}

impl ContextInput {
    /// Builds the core [`ExecutionContext`], attaching the workspace id the
    /// authenticated principal resolved to rather than anything the caller
    /// claims in the body.
    #[must_use]
    pub fn into_context(self, workspace_id: impl Into<String>, principal_id: Option<String>) -> ExecutionContext {
        let mut builder = ExecutionContext::builder(workspace_id).streaming_preferred(self.streaming_preferred);
        if let Some(id) = self.request_id {
            builder = builder.request_id(id);
        }
        if let Some(id) = self.connection_id {
            builder = builder.connection_id(id);
        }
        if let Some(id) = principal_id {
            builder = builder.principal_id(id);
        }
        if let Some(rows) = self.max_rows {
            builder = builder.max_rows(rows);
        }
        if let Some(secs) = self.timeout_seconds {
            builder = builder.timeout_seconds(secs);
        }
        if let Some(mb) = self.memory_mb {
            builder = builder.memory_mb(mb);
        }
        if let Some(kb) = self.output_kb {
            builder = builder.output_kb(kb);
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteSqlRequest {
    #[serde(flatten)]
    pub context: ContextInput,
    pub query: String,
    #[serde(default)]
    pub bindings: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteCodeRequest {
    #[serde(flatten)]
    pub context: ContextInput,
    pub code: String,
    #[serde(default)]
    pub input_data: Vec<serde_json::Value>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreateVisualizationRequest {
    /// A script already produced its own spec (§4.7 code-driven path).
    CodeDriven {
        #[serde(flatten)]
        context: ContextInput,
        spec: serde_json::Value,
    },
    /// The adapter derives the spec from tabular data.
    FromData {
        #[serde(flatten)]
        context: ContextInput,
        data: Vec<serde_json::Map<String, serde_json::Value>>,
        instruction: Option<String>,
        #[serde(default)]
        chart_type: Option<ChartKind>,
        title: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct SyncSchemaRequest {
    #[serde(flatten)]
    pub context: ContextInput,
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TableSamplesRequest {
    #[serde(flatten)]
    pub context: ContextInput,
    pub table: String,
    #[serde(default = "default_sample_limit")]
    pub limit: u64,
}

fn default_sample_limit() -> u64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    #[serde(flatten)]
    pub descriptor: ConnectionDescriptorInput,
}

pub use sandbox_db::ConnectionDescriptorInput as CreateConnectionRequest;

/// `{request-id, status, metrics, body, error?}` (§6). Errors bypass this
/// type entirely: `RuntimeError::into_response` builds its own body, so
/// only the success path constructs an envelope.
#[derive(Debug, Serialize)]
pub struct ResponseEnvelope<T: Serialize> {
    pub request_id: String,
    pub status: &'static str,
    pub metrics: serde_json::Value,
    pub body: T,
}

impl<T: Serialize> ResponseEnvelope<T> {
    #[must_use]
    pub fn success(request_id: impl Into<String>, metrics: serde_json::Value, body: T) -> Self {
        Self { request_id: request_id.into(), status: "success", metrics, body }
    }
}
