use serde::Serialize;

use sandbox_context::ExecutionMetrics;
use sandbox_db::{ColumnSchema, Row};

/// `query-result` (§3): column schema, ordered rows, row count, and the
/// optional "total available before truncation" the executor records when
/// `max-rows` clips the result. A non-error result has no error field —
/// failures are reported as `Err(RuntimeError)` from the executor instead,
/// matching the invariant "a non-error result has `error = ∅`" without
/// needing a redundant in-band error field.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnSchema>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub total_rows_available: Option<u64>,
    pub metrics: ExecutionMetrics,
}
