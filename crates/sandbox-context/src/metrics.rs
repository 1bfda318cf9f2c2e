use std::time::Instant;

use chrono::{DateTime, Utc};
use sandbox_error::RuntimeError;
use serde::{Deserialize, Serialize};

/// Per-execution metrics envelope. `duration` is derived from
/// `start_time`/`end_time`, never stored redundantly. `complete()` is a
/// one-shot state transition: calling it twice is a programming error,
/// surfaced as `RuntimeError::Internal` rather than silently overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub rows_processed: u64,
    pub rows_returned: u64,
    pub memory_used_mb: Option<u64>,
    pub cpu_time_ms: Option<u64>,

    #[serde(skip)]
    started_at: Option<Instant>,
}

impl ExecutionMetrics {
    #[must_use]
    pub fn start() -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            rows_processed: 0,
            rows_returned: 0,
            memory_used_mb: None,
            cpu_time_ms: None,
            started_at: Some(Instant::now()),
        }
    }

    /// One-shot completion. Returns `RuntimeError::Internal` if already completed.
    pub fn complete(&mut self) -> Result<(), RuntimeError> {
        if self.end_time.is_some() {
            return Err(RuntimeError::internal("ExecutionMetrics::complete called twice"));
        }
        self.end_time = Some(Utc::now());
        Ok(())
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Derived duration; `None` until `complete()` has been called.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time.map(|end| (end - self.start_time).num_milliseconds())
    }

    /// Elapsed wall-clock time since `start()`, usable before completion
    /// (e.g. to check against a deadline mid-execution).
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn record_rows(&mut self, processed: u64, returned: u64) {
        self.rows_processed = processed;
        self.rows_returned = returned;
    }

    pub fn record_resource_usage(&mut self, memory_used_mb: Option<u64>, cpu_time_ms: Option<u64>) {
        self.memory_used_mb = memory_used_mb;
        self.cpu_time_ms = cpu_time_ms;
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_none_until_complete() {
        let metrics = ExecutionMetrics::start();
        assert!(metrics.duration_ms().is_none());
    }

    #[test]
    fn complete_is_one_shot() {
        let mut metrics = ExecutionMetrics::start();
        metrics.complete().unwrap();
        assert!(metrics.duration_ms().is_some());
        assert!(metrics.complete().is_err());
    }

    #[test]
    fn record_rows_sets_both_counters() {
        let mut metrics = ExecutionMetrics::start();
        metrics.record_rows(15, 10);
        assert_eq!(metrics.rows_processed, 15);
        assert_eq!(metrics.rows_returned, 10);
    }
}
