use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configured defaults for resource caps. A context's explicit values
/// always win over these; see [`ExecutionContext::effective_max_rows`] and
/// friends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_rows: u64,
    pub timeout_seconds: u64,
    pub memory_mb: u64,
    pub output_kb: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self { max_rows: 10_000, timeout_seconds: 60, memory_mb: 512, output_kb: 1024 }
    }
}

/// The per-request execution context. Immutable once built — there are no
/// setters, only the fallible [`ContextBuilder`].
///
/// Invariants: `request_id` is non-empty and unique per invocation
/// (assigned if the caller omitted one); any limit set on the context
/// overrides the configured default; the lifetime of a context is the
/// duration of exactly one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub request_id: String,
    pub workspace_id: String,
    pub connection_id: Option<String>,
    pub principal_id: Option<String>,
    pub trace_id: String,
    pub span_id: String,
    max_rows: Option<u64>,
    timeout_seconds: Option<u64>,
    memory_mb: Option<u64>,
    output_kb: Option<u64>,
    pub streaming_preferred: bool,
}

impl ExecutionContext {
    #[must_use]
    pub fn builder(workspace_id: impl Into<String>) -> ContextBuilder {
        ContextBuilder::new(workspace_id)
    }

    #[must_use]
    pub fn effective_max_rows(&self, defaults: &ResourceLimits) -> u64 {
        self.max_rows.unwrap_or(defaults.max_rows)
    }

    #[must_use]
    pub fn effective_timeout_seconds(&self, defaults: &ResourceLimits) -> u64 {
        self.timeout_seconds.unwrap_or(defaults.timeout_seconds)
    }

    #[must_use]
    pub fn effective_memory_mb(&self, defaults: &ResourceLimits) -> u64 {
        self.memory_mb.unwrap_or(defaults.memory_mb)
    }

    #[must_use]
    pub fn effective_output_kb(&self, defaults: &ResourceLimits) -> u64 {
        self.output_kb.unwrap_or(defaults.output_kb)
    }
}

/// Builds an [`ExecutionContext`], assigning a fresh request id and trace id
/// when the caller does not supply one.
pub struct ContextBuilder {
    workspace_id: String,
    request_id: Option<String>,
    connection_id: Option<String>,
    principal_id: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    max_rows: Option<u64>,
    timeout_seconds: Option<u64>,
    memory_mb: Option<u64>,
    output_kb: Option<u64>,
    streaming_preferred: bool,
}

impl ContextBuilder {
    fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            request_id: None,
            connection_id: None,
            principal_id: None,
            trace_id: None,
            span_id: None,
            max_rows: None,
            timeout_seconds: None,
            memory_mb: None,
            output_kb: None,
            streaming_preferred: false,
        }
    }

    #[must_use]
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn principal_id(mut self, id: impl Into<String>) -> Self {
        self.principal_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn max_rows(mut self, rows: u64) -> Self {
        self.max_rows = Some(rows);
        self
    }

    #[must_use]
    pub fn timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = Some(secs);
        self
    }

    #[must_use]
    pub fn memory_mb(mut self, mb: u64) -> Self {
        self.memory_mb = Some(mb);
        self
    }

    #[must_use]
    pub fn output_kb(mut self, kb: u64) -> Self {
        self.output_kb = Some(kb);
        self
    }

    #[must_use]
    pub fn streaming_preferred(mut self, preferred: bool) -> Self {
        self.streaming_preferred = preferred;
        self
    }

    #[must_use]
    pub fn build(self) -> ExecutionContext {
        let request_id = self.request_id.filter(|id| !id.is_empty()).unwrap_or_else(|| Uuid::new_v4().to_string());
        let trace_id = self.trace_id.unwrap_or_else(|| request_id.clone());
        let span_id = self.span_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        ExecutionContext {
            request_id,
            workspace_id: self.workspace_id,
            connection_id: self.connection_id,
            principal_id: self.principal_id,
            trace_id,
            span_id,
            max_rows: self.max_rows,
            timeout_seconds: self.timeout_seconds,
            memory_mb: self.memory_mb,
            output_kb: self.output_kb,
            streaming_preferred: self.streaming_preferred,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_assigned_when_absent() {
        let ctx = ExecutionContext::builder("ws1").build();
        assert!(!ctx.request_id.is_empty());
        assert_eq!(ctx.trace_id, ctx.request_id);
    }

    #[test]
    fn explicit_request_id_is_preserved() {
        let ctx = ExecutionContext::builder("ws1").request_id("req-123").build();
        assert_eq!(ctx.request_id, "req-123");
    }

    #[test]
    fn explicit_limit_overrides_configured_default() {
        let defaults = ResourceLimits::default();
        let ctx = ExecutionContext::builder("ws1").max_rows(5).build();
        assert_eq!(ctx.effective_max_rows(&defaults), 5);

        let unset_ctx = ExecutionContext::builder("ws1").build();
        assert_eq!(unset_ctx.effective_max_rows(&defaults), defaults.max_rows);
    }
}
