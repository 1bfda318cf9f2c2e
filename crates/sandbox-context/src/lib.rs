//! Per-request execution context, deadline propagation and the metrics
//! envelope shared by the SQL and code execution paths.

mod context;
mod deadline;
mod metrics;

pub use context::{ContextBuilder, ExecutionContext, ResourceLimits};
pub use deadline::DeadlineToken;
pub use metrics::ExecutionMetrics;
