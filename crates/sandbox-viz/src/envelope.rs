use serde::Serialize;

use sandbox_context::ExecutionMetrics;

use crate::chart::ChartKind;

/// `visualization-envelope` (§3): the rendered spec plus the metadata a
/// caller needs to display it sensibly without re-deriving it.
#[derive(Debug, Clone, Serialize)]
pub struct VisualizationEnvelope {
    pub spec: serde_json::Value,
    pub chart_kind: ChartKind,
    pub data_points: usize,
    pub insight: Option<String>,
    pub metrics: ExecutionMetrics,
}
