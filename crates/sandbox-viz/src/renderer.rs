use sandbox_db::{CanonicalType, ColumnSchema, Row, Value};

use crate::chart::ChartKind;

/// The external renderer contract. The real renderer (whatever turns a
/// spec into pixels) is out of scope; this crate ships one reference
/// implementation so the contract is testable end-to-end.
pub trait Renderer: Send + Sync + std::fmt::Debug {
    fn render(&self, columns: &[ColumnSchema], rows: &[Row], chart_kind: ChartKind, title: Option<&str>) -> serde_json::Value;
}

/// Emits a generic Vega-Lite-shaped spec: mark type, inline row data, and
/// a best-effort encoding over the first two columns.
#[derive(Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, columns: &[ColumnSchema], rows: &[Row], chart_kind: ChartKind, title: Option<&str>) -> serde_json::Value {
        let mark = mark_for(chart_kind);
        let values: Vec<serde_json::Value> = rows.iter().map(|row| row_to_json_object(columns, row)).collect();

        let mut spec = serde_json::json!({
            "mark": mark,
            "data": { "values": values },
        });

        if let Some(title) = title {
            spec["title"] = serde_json::Value::String(title.to_string());
        }

        if columns.len() >= 2 {
            spec["encoding"] = serde_json::json!({
                "x": { "field": columns[0].name, "type": vega_type(columns[0].declared_type) },
                "y": { "field": columns[1].name, "type": vega_type(columns[1].declared_type) },
            });
        }

        spec
    }
}

fn mark_for(chart_kind: ChartKind) -> &'static str {
    match chart_kind {
        ChartKind::Line => "line",
        ChartKind::Bar | ChartKind::Auto | ChartKind::Histogram => "bar",
        ChartKind::Pie => "arc",
        ChartKind::Scatter => "point",
        ChartKind::Heatmap => "rect",
        ChartKind::Table => "table",
        ChartKind::Area => "area",
    }
}

fn vega_type(declared_type: CanonicalType) -> &'static str {
    match declared_type {
        CanonicalType::Int | CanonicalType::Float => "quantitative",
        CanonicalType::Timestamp => "temporal",
        _ => "nominal",
    }
}

fn row_to_json_object(columns: &[ColumnSchema], row: &Row) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    for (column, value) in columns.iter().zip(&row.values) {
        obj.insert(column.name.clone(), value_to_json(value));
    }
    serde_json::Value::Object(obj)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::json!(i),
        Value::Float(f) => serde_json::json!(f),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::String(format!("<{} bytes>", b.len())),
        Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
        Value::Json(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_carries_mark_and_inline_values() {
        let columns = vec![
            ColumnSchema { name: "x".to_string(), declared_type: CanonicalType::Text, masked: false },
            ColumnSchema { name: "y".to_string(), declared_type: CanonicalType::Int, masked: false },
        ];
        let rows = vec![Row { values: vec![Value::Text("a".to_string()), Value::Int(1)] }];

        let spec = JsonRenderer.render(&columns, &rows, ChartKind::Bar, Some("Revenue"));
        assert_eq!(spec["mark"], "bar");
        assert_eq!(spec["title"], "Revenue");
        assert_eq!(spec["data"]["values"][0]["x"], "a");
        assert_eq!(spec["data"]["values"][0]["y"], 1);
    }
}
