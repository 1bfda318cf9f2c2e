use sandbox_db::{CanonicalType, ColumnSchema};
use serde::{Deserialize, Serialize};

/// Supported chart kinds, unchanged from the original `ChartType` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Auto,
    Line,
    Bar,
    Pie,
    Scatter,
    Heatmap,
    Table,
    Area,
    Histogram,
}

struct ColumnShape {
    numeric: usize,
    categorical: usize,
    temporal: usize,
}

fn shape_of(columns: &[ColumnSchema]) -> ColumnShape {
    let mut shape = ColumnShape { numeric: 0, categorical: 0, temporal: 0 };
    for column in columns {
        match column.declared_type {
            CanonicalType::Int | CanonicalType::Float => shape.numeric += 1,
            CanonicalType::Timestamp => shape.temporal += 1,
            CanonicalType::Text => shape.categorical += 1,
            CanonicalType::Bool | CanonicalType::Null | CanonicalType::Bytes | CanonicalType::Json => {}
        }
    }
    shape
}

const LINE_HINTS: &[&str] = &["line", "trend", "time", "over time"];
const BAR_HINTS: &[&str] = &["bar", "compare", "comparison"];
const PIE_HINTS: &[&str] = &["pie", "proportion", "percentage", "share"];
const SCATTER_HINTS: &[&str] = &["scatter", "correlation", "relationship"];
const HEATMAP_HINTS: &[&str] = &["heat", "matrix"];
const TABLE_HINTS: &[&str] = &["table", "list"];

/// Pure heuristic over column-type counts plus an optional instruction
/// hint, translated from `_detect_chart_type`: instruction keywords win
/// outright, otherwise fall back to type-shape rules in the same order
/// as the original.
#[must_use]
pub fn detect_chart_kind(columns: &[ColumnSchema], row_count: usize, unique_categories: Option<usize>, instruction: Option<&str>) -> ChartKind {
    if let Some(instruction) = instruction {
        let lowered = instruction.to_lowercase();
        if LINE_HINTS.iter().any(|w| lowered.contains(w)) {
            return ChartKind::Line;
        }
        if BAR_HINTS.iter().any(|w| lowered.contains(w)) {
            return ChartKind::Bar;
        }
        if PIE_HINTS.iter().any(|w| lowered.contains(w)) {
            return ChartKind::Pie;
        }
        if SCATTER_HINTS.iter().any(|w| lowered.contains(w)) {
            return ChartKind::Scatter;
        }
        if HEATMAP_HINTS.iter().any(|w| lowered.contains(w)) {
            return ChartKind::Heatmap;
        }
        if TABLE_HINTS.iter().any(|w| lowered.contains(w)) {
            return ChartKind::Table;
        }
    }

    let shape = shape_of(columns);

    if shape.temporal > 0 && shape.numeric > 0 {
        return ChartKind::Line;
    }

    if shape.categorical == 1 && shape.numeric >= 1 {
        if let Some(unique) = unique_categories {
            if unique <= 5 {
                return ChartKind::Pie;
            }
            if unique <= 10 {
                return ChartKind::Bar;
            }
        } else {
            return ChartKind::Bar;
        }
    }

    if shape.numeric >= 2 && shape.categorical == 0 {
        return ChartKind::Scatter;
    }

    if shape.numeric > 2 {
        return if row_count <= 20 { ChartKind::Heatmap } else { ChartKind::Bar };
    }

    ChartKind::Bar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, ty: CanonicalType) -> ColumnSchema {
        ColumnSchema { name: name.to_string(), declared_type: ty, masked: false }
    }

    #[test]
    fn instruction_hint_wins_outright() {
        let columns = vec![column("a", CanonicalType::Int)];
        assert_eq!(detect_chart_kind(&columns, 10, None, Some("show me a pie of shares")), ChartKind::Pie);
    }

    #[test]
    fn temporal_plus_numeric_is_a_line_chart() {
        let columns = vec![column("day", CanonicalType::Timestamp), column("count", CanonicalType::Int)];
        assert_eq!(detect_chart_kind(&columns, 100, None, None), ChartKind::Line);
    }

    #[test]
    fn single_category_with_few_values_is_a_pie() {
        let columns = vec![column("region", CanonicalType::Text), column("revenue", CanonicalType::Float)];
        assert_eq!(detect_chart_kind(&columns, 4, Some(4), None), ChartKind::Pie);
    }

    #[test]
    fn two_numeric_columns_with_no_category_is_a_scatter() {
        let columns = vec![column("x", CanonicalType::Float), column("y", CanonicalType::Float)];
        assert_eq!(detect_chart_kind(&columns, 200, None, None), ChartKind::Scatter);
    }

    #[test]
    fn many_numeric_columns_with_few_rows_is_a_heatmap() {
        let columns = vec![
            column("a", CanonicalType::Float),
            column("b", CanonicalType::Float),
            column("c", CanonicalType::Float),
        ];
        assert_eq!(detect_chart_kind(&columns, 15, None, None), ChartKind::Heatmap);
    }

    #[test]
    fn default_is_a_bar_chart() {
        let columns = vec![column("only", CanonicalType::Bool)];
        assert_eq!(detect_chart_kind(&columns, 3, None, None), ChartKind::Bar);
    }
}
