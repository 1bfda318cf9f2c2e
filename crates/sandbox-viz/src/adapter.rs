use std::collections::HashSet;
use std::sync::Arc;

use sandbox_config::DataSharingConfig;
use sandbox_context::{ExecutionContext, ExecutionMetrics, ResourceLimits};
use sandbox_db::{CanonicalType, ColumnSchema, Row, Value};
use sandbox_error::{ResourceClass, RuntimeError};

use crate::aggregate::aggregate;
use crate::chart::{detect_chart_kind, ChartKind};
use crate::envelope::VisualizationEnvelope;
use crate::renderer::Renderer;

/// `VisualizationAdapter` (§4.7): aggregates/downsamples a result set,
/// picks a chart kind, and hands off to a [`Renderer`].
pub struct VisualizationAdapter {
    data_sharing: DataSharingConfig,
    defaults: ResourceLimits,
    renderer: Arc<dyn Renderer>,
}

impl VisualizationAdapter {
    #[must_use]
    pub fn new(data_sharing: DataSharingConfig, defaults: ResourceLimits, renderer: Arc<dyn Renderer>) -> Self {
        Self { data_sharing, defaults, renderer }
    }

    pub fn generate(
        &self,
        context: &ExecutionContext,
        columns: &[ColumnSchema],
        rows: Vec<Row>,
        instruction: Option<&str>,
        chart_type: ChartKind,
        title: Option<&str>,
    ) -> Result<VisualizationEnvelope, RuntimeError> {
        if rows.is_empty() {
            return Err(RuntimeError::validation("no data to visualize"));
        }

        let mut metrics = ExecutionMetrics::start();
        let original_rows = rows.len() as u64;

        let (agg_columns, agg_rows) = if original_rows > self.data_sharing.force_aggregate_threshold {
            aggregate(columns, rows, self.data_sharing.max_viz_points as usize)
        } else {
            (columns.to_vec(), rows)
        };

        let unique_categories = categorical_cardinality(&agg_columns, &agg_rows);
        let chart_kind = if chart_type == ChartKind::Auto {
            detect_chart_kind(&agg_columns, agg_rows.len(), unique_categories, instruction)
        } else {
            chart_type
        };

        let spec = self.renderer.render(&agg_columns, &agg_rows, chart_kind, title);

        let spec_size = serde_json::to_vec(&spec).map(|bytes| bytes.len()).unwrap_or(0);
        let max_bytes = (context.effective_output_kb(&self.defaults) as usize) * 1024;
        if spec_size > max_bytes {
            return Err(RuntimeError::ResourceLimit { resource: ResourceClass::OutputSize });
        }

        let insight = generate_insight(&agg_columns, &agg_rows);

        metrics.record_rows(original_rows, agg_rows.len() as u64);
        metrics.complete()?;

        Ok(VisualizationEnvelope { spec, chart_kind, data_points: agg_rows.len(), insight: Some(insight), metrics })
    }

    /// Code-driven variant (§4.7): accepts a spec a sandboxed script
    /// already produced and validates only the documented shape — an
    /// object containing a `data` array — since the script, not this
    /// crate, chose the chart kind and rendering.
    pub fn accept_code_driven_spec(&self, spec: serde_json::Value) -> Result<VisualizationEnvelope, RuntimeError> {
        let data_points = spec
            .as_object()
            .and_then(|obj| obj.get("data"))
            .and_then(|data| data.as_array())
            .ok_or_else(|| RuntimeError::validation("code-driven visualization must be an object with a `data` array"))?
            .len();

        let mut metrics = ExecutionMetrics::start();
        metrics.record_rows(data_points as u64, data_points as u64);
        metrics.complete()?;

        Ok(VisualizationEnvelope { spec, chart_kind: ChartKind::Auto, data_points, insight: None, metrics })
    }
}

fn categorical_cardinality(columns: &[ColumnSchema], rows: &[Row]) -> Option<usize> {
    let idx = columns.iter().position(|c| c.declared_type == CanonicalType::Text)?;
    let unique: HashSet<&str> = rows
        .iter()
        .filter_map(|row| if let Value::Text(s) = &row.values[idx] { Some(s.as_str()) } else { None })
        .collect();
    Some(unique.len())
}

/// Translated from `_generate_insight`: total/avg/range for the first two
/// numeric columns, falling back to a row/column count summary.
fn generate_insight(columns: &[ColumnSchema], rows: &[Row]) -> String {
    let numeric_idx: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c.declared_type, CanonicalType::Int | CanonicalType::Float))
        .map(|(i, _)| i)
        .take(2)
        .collect();

    let mut parts = Vec::new();
    for idx in numeric_idx {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| match &row.values[idx] {
                Value::Int(i) => Some(*i as f64),
                Value::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        if values.is_empty() {
            continue;
        }
        let total: f64 = values.iter().sum();
        let avg = total / values.len() as f64;
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        parts.push(format!("{}: Total={total:.2}, Avg={avg:.2}, Range=[{min:.2} - {max:.2}]", columns[idx].name));
    }

    if parts.is_empty() {
        format!("Data contains {} records across {} columns", rows.len(), columns.len())
    } else {
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::JsonRenderer;

    fn adapter() -> VisualizationAdapter {
        VisualizationAdapter::new(DataSharingConfig::default(), ResourceLimits::default(), Arc::new(JsonRenderer))
    }

    fn columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema { name: "category".to_string(), declared_type: CanonicalType::Text, masked: false },
            ColumnSchema { name: "amount".to_string(), declared_type: CanonicalType::Int, masked: false },
        ]
    }

    #[test]
    fn empty_input_is_rejected() {
        let ctx = ExecutionContext::builder("ws1").build();
        let err = adapter().generate(&ctx, &columns(), Vec::new(), None, ChartKind::Auto, None).unwrap_err();
        assert_eq!(err.error_code(), "validation");
    }

    #[test]
    fn generates_an_insight_and_a_spec() {
        let ctx = ExecutionContext::builder("ws1").build();
        let rows = vec![
            Row { values: vec![Value::Text("a".to_string()), Value::Int(10)] },
            Row { values: vec![Value::Text("b".to_string()), Value::Int(20)] },
        ];
        let envelope = adapter().generate(&ctx, &columns(), rows, None, ChartKind::Auto, Some("Demo")).unwrap();
        assert!(envelope.insight.is_some());
        assert_eq!(envelope.spec["title"], "Demo");
    }

    #[test]
    fn code_driven_spec_requires_a_data_array() {
        let missing = serde_json::json!({"not_data": []});
        assert!(adapter().accept_code_driven_spec(missing).is_err());

        let valid = serde_json::json!({"data": [{"x": 1}]});
        let envelope = adapter().accept_code_driven_spec(valid).unwrap();
        assert_eq!(envelope.data_points, 1);
    }
}
