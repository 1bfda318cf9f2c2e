use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use sandbox_context::{DeadlineToken, ExecutionContext, ExecutionMetrics, ResourceLimits};
use sandbox_db::{AnyPool, ConnectionRegistry, RowBatch, Value};
use sandbox_error::RuntimeError;

use crate::masker::Masker;
use crate::policy::SqlPolicy;
use crate::result::QueryResult;

const STREAM_BATCH_SIZE: usize = 500;

/// `execute(context, statement, bindings) -> query-result` (§4.4).
/// Composes [`SqlPolicy`], [`ConnectionRegistry`], and [`Masker`] exactly
/// as the spec describes: validate, acquire, bind, run under a deadline,
/// mask, enforce `max-rows`.
pub struct SqlExecutor {
    registry: Arc<ConnectionRegistry>,
    policy: SqlPolicy,
    masker: Masker,
    defaults: ResourceLimits,
}

impl SqlExecutor {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, policy: SqlPolicy, masker: Masker, defaults: ResourceLimits) -> Self {
        Self { registry, policy, masker, defaults }
    }

    pub async fn execute(
        &self,
        context: &ExecutionContext,
        statement: &str,
        bindings: &HashMap<String, Value>,
    ) -> Result<QueryResult, RuntimeError> {
        let connection_id = context
            .connection_id
            .as_deref()
            .ok_or_else(|| RuntimeError::validation("connection_id is required for SQL execution"))?;

        self.policy.validate(statement)?;

        let pool = self
            .registry
            .get(connection_id)
            .ok_or_else(|| RuntimeError::validation(format!("unknown connection id: {connection_id}")))?;

        let mut metrics = ExecutionMetrics::start();
        let timeout = Duration::from_secs(context.effective_timeout_seconds(&self.defaults));
        let max_rows = context.effective_max_rows(&self.defaults);
        let fetch_limit = max_rows.saturating_add(1);

        let raw = tokio::time::timeout(timeout, async {
            let conn = pool.acquire().await?;
            let result = conn.execute(statement, bindings, Some(fetch_limit)).await;
            conn.release().await;
            result
        })
        .await
        .map_err(|_| RuntimeError::Timeout)??;

        let (masked_columns, mut masked_rows) = self.masker.mask_rows(&raw.columns, raw.rows);

        let rows_processed = masked_rows.len() as u64;
        let total_rows_available = if rows_processed > max_rows {
            masked_rows.truncate(max_rows as usize);
            Some(self.count_total_rows(&pool, statement, bindings, timeout, fetch_limit).await)
        } else {
            None
        };

        metrics.record_rows(rows_processed, masked_rows.len() as u64);
        metrics.complete()?;

        Ok(QueryResult {
            columns: masked_columns,
            row_count: masked_rows.len(),
            rows: masked_rows,
            total_rows_available,
            metrics,
        })
    }

    /// Runs only on the truncation path — a single `COUNT(*)` wrapping the
    /// original statement, so callers get an exact `total-rows-available`
    /// (§3, §8 scenario 2) without the main fetch ever materializing more
    /// than `fetch_limit` rows. Falls back to `fetch_limit` itself (a
    /// known lower bound) if the count round-trip errors or times out —
    /// never fails the request over a best-effort number.
    async fn count_total_rows(
        &self,
        pool: &AnyPool,
        statement: &str,
        bindings: &HashMap<String, Value>,
        timeout: Duration,
        fallback: u64,
    ) -> u64 {
        let trimmed = statement.trim().trim_end_matches(';').trim();
        let count_statement = format!("SELECT COUNT(*) AS sandbox_total_count FROM ({trimmed}) AS sandbox_count_wrapper");

        let outcome = tokio::time::timeout(timeout, async {
            let conn = pool.acquire().await?;
            let result = conn.execute(&count_statement, bindings, None).await;
            conn.release().await;
            result
        })
        .await;

        match outcome {
            Ok(Ok(raw)) => raw
                .rows
                .first()
                .and_then(|row| row.values.first())
                .and_then(|value| match value {
                    Value::Int(n) => Some((*n).max(0) as u64),
                    Value::Float(n) => Some(n.max(0.0) as u64),
                    _ => None,
                })
                .unwrap_or(fallback),
            _ => fallback,
        }
    }

    /// Streaming variant (§4.4): yields masked batches lazily when the
    /// caller prefers streaming and the connector supports it. The
    /// deadline wraps the whole stream, not each batch — "each batch is
    /// separately subject to the wall-clock deadline (not reset per
    /// batch)".
    pub fn stream<'a>(
        &'a self,
        context: &'a ExecutionContext,
        statement: &'a str,
        bindings: &'a HashMap<String, Value>,
    ) -> impl Stream<Item = Result<RowBatch, RuntimeError>> + 'a {
        let max_rows = context.effective_max_rows(&self.defaults);
        let timeout_secs = context.effective_timeout_seconds(&self.defaults);

        try_stream! {
            let connection_id = context
                .connection_id
                .as_deref()
                .ok_or_else(|| RuntimeError::validation("connection_id is required for SQL execution"))?;
            self.policy.validate(statement)?;
            let pool = self
                .registry
                .get(connection_id)
                .ok_or_else(|| RuntimeError::validation(format!("unknown connection id: {connection_id}")))?;

            let deadline = DeadlineToken::from_timeout(Duration::from_secs(timeout_secs));
            let conn = pool.acquire().await?;
            let mut inner = conn.stream(statement, bindings, STREAM_BATCH_SIZE, Some(max_rows)).await?;

            let mut rows_yielded: u64 = 0;
            while let Some(batch) = inner.next().await {
                if deadline.is_expired() {
                    conn.release().await;
                    Err(RuntimeError::Timeout)?;
                }
                let batch = batch?;
                let (columns, mut rows) = self.masker.mask_rows(&batch.columns, batch.rows);
                if rows_yielded + rows.len() as u64 > max_rows {
                    let remaining = (max_rows - rows_yielded) as usize;
                    rows.truncate(remaining);
                }
                rows_yielded += rows.len() as u64;
                let exhausted = rows_yielded >= max_rows;
                yield RowBatch { columns, rows };
                if exhausted {
                    break;
                }
            }
            conn.release().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_config::SecurityConfig;

    fn executor(registry: Arc<ConnectionRegistry>) -> SqlExecutor {
        SqlExecutor::new(registry, SqlPolicy::from_config(&SecurityConfig::default()), Masker::from_config(&SecurityConfig::default()), ResourceLimits::default())
    }

    #[tokio::test]
    async fn missing_connection_id_is_a_validation_error() {
        let registry = Arc::new(ConnectionRegistry::new());
        let ctx = ExecutionContext::builder("ws1").build();
        let err = executor(registry).execute(&ctx, "SELECT 1", &HashMap::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "validation");
    }

    #[tokio::test]
    async fn unknown_connection_id_is_a_validation_error() {
        let registry = Arc::new(ConnectionRegistry::new());
        let ctx = ExecutionContext::builder("ws1").connection_id("does-not-exist").build();
        let err = executor(registry).execute(&ctx, "SELECT 1", &HashMap::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "validation");
    }

    #[tokio::test]
    async fn policy_rejection_happens_before_any_pool_lookup() {
        let registry = Arc::new(ConnectionRegistry::new());
        let ctx = ExecutionContext::builder("ws1").connection_id("pg1").build();
        let err = executor(registry).execute(&ctx, "DROP TABLE users", &HashMap::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "policy_violation");
    }
}
