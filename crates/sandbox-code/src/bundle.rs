use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One-shot message written to the worker's stdin (§4.6 step 3): source,
/// the caller's input rows/variables, and the resource caps the worker
/// must install with `rlimit` before running any user code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBundle {
    pub code: String,
    pub data: Vec<serde_json::Value>,
    pub variables: HashMap<String, serde_json::Value>,
    pub allowed_imports: Vec<String>,
    pub memory_mb: u64,
    pub timeout_seconds: u64,
    pub output_kb: u64,
}

/// Whitelisted result-variable names the worker extracts from the
/// executed script's locals, matching `python_executor.py`'s
/// `_execute_in_sandbox` result-variable list one-to-one.
pub const RESULT_VARIABLE_NAMES: &[&str] = &["result", "summary_text", "plotly_figure", "insight", "explanation", "output"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Success,
    Error,
    MemoryError,
}

/// The single JSON line the worker posts to stdout on completion,
/// success, error, or OOM (§4.6 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub status: WorkerStatus,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub variables: HashMap<String, serde_json::Value>,
    pub execution_time_ms: u64,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
}
