use std::collections::HashMap;

use serde::Serialize;

use sandbox_context::ExecutionMetrics;

/// `code-execution-outcome` (§3): captured stdout/stderr, the whitelisted
/// result variables the script produced, and completed metrics. Returned
/// only on success — failures surface as `Err(RuntimeError)` from
/// [`crate::runner::SandboxRunner::run`], same convention as `QueryResult`.
#[derive(Debug, Clone, Serialize)]
pub struct CodeExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub variables: HashMap<String, serde_json::Value>,
    pub metrics: ExecutionMetrics,
}
