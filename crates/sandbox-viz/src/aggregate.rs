use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};

use sandbox_db::{CanonicalType, ColumnSchema, Row, Value};

const TOP_N_CATEGORIES: usize = 50;

#[derive(Clone, Copy)]
enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

fn bucket_key(ts: DateTime<Utc>, freq: Frequency) -> String {
    match freq {
        Frequency::Daily => ts.format("%Y-%m-%d").to_string(),
        Frequency::Weekly => {
            let iso = ts.iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        Frequency::Monthly => ts.format("%Y-%m").to_string(),
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Downsamples a result set to at most `max_points` rows, translated from
/// `_aggregate_data`: time-bucket when a temporal+numeric pair exists,
/// otherwise keep the top `N` categories by the first numeric column's
/// sum, otherwise fall back to uniform sampling. Uses deterministic
/// step-based sampling rather than `df.sample(random_state=42)`'s PRNG
/// draw — reproducible without pulling in a seeded RNG for one call site.
#[must_use]
pub fn aggregate(columns: &[ColumnSchema], rows: Vec<Row>, max_points: usize) -> (Vec<ColumnSchema>, Vec<Row>) {
    let temporal_idx = columns.iter().position(|c| c.declared_type == CanonicalType::Timestamp);
    let numeric_idx: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c.declared_type, CanonicalType::Int | CanonicalType::Float))
        .map(|(i, _)| i)
        .collect();
    let categorical_idx = columns.iter().position(|c| c.declared_type == CanonicalType::Text);

    if let Some(t_idx) = temporal_idx {
        if !numeric_idx.is_empty() {
            let (bucketed_columns, bucketed_rows) = time_bucket(columns, &rows, t_idx, &numeric_idx);
            return finish(bucketed_columns, bucketed_rows, max_points);
        }
    }

    if let Some(c_idx) = categorical_idx {
        let limited = top_n_categories(rows, c_idx, numeric_idx.first().copied());
        return finish(columns.to_vec(), limited, max_points);
    }

    finish(columns.to_vec(), rows, max_points)
}

fn finish(columns: Vec<ColumnSchema>, rows: Vec<Row>, max_points: usize) -> (Vec<ColumnSchema>, Vec<Row>) {
    if rows.len() > max_points {
        (columns, uniform_sample(rows, max_points))
    } else {
        (columns, rows)
    }
}

fn time_bucket(columns: &[ColumnSchema], rows: &[Row], t_idx: usize, numeric_idx: &[usize]) -> (Vec<ColumnSchema>, Vec<Row>) {
    let timestamps: Vec<DateTime<Utc>> =
        rows.iter().filter_map(|r| if let Value::Timestamp(ts) = &r.values[t_idx] { Some(*ts) } else { None }).collect();

    let (Some(min), Some(max)) = (timestamps.iter().min(), timestamps.iter().max()) else {
        return (columns.to_vec(), rows.to_vec());
    };

    let range_days = (*max - *min).num_days();
    let freq = if range_days > 365 * 2 {
        Frequency::Monthly
    } else if range_days > 90 {
        Frequency::Weekly
    } else {
        Frequency::Daily
    };

    let mut buckets: HashMap<String, (DateTime<Utc>, Vec<f64>)> = HashMap::new();
    for row in rows {
        let Value::Timestamp(ts) = &row.values[t_idx] else { continue };
        let key = bucket_key(*ts, freq);
        let entry = buckets.entry(key).or_insert_with(|| (*ts, vec![0.0; numeric_idx.len()]));
        for (slot, &idx) in numeric_idx.iter().enumerate() {
            if let Some(v) = numeric_value(&row.values[idx]) {
                entry.1[slot] += v;
            }
        }
    }

    let mut bucketed: Vec<_> = buckets.into_values().collect();
    bucketed.sort_by_key(|(ts, _)| *ts);

    let mut bucketed_columns = vec![columns[t_idx].clone()];
    bucketed_columns.extend(numeric_idx.iter().map(|&i| columns[i].clone()));

    let bucketed_rows = bucketed
        .into_iter()
        .map(|(ts, sums)| {
            let mut values = vec![Value::Timestamp(ts)];
            values.extend(sums.into_iter().map(Value::Float));
            Row { values }
        })
        .collect();

    (bucketed_columns, bucketed_rows)
}

fn top_n_categories(rows: Vec<Row>, c_idx: usize, numeric_idx: Option<usize>) -> Vec<Row> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for row in &rows {
        if let Value::Text(category) = &row.values[c_idx] {
            let contribution = numeric_idx.and_then(|idx| numeric_value(&row.values[idx])).unwrap_or(1.0);
            *totals.entry(category.clone()).or_insert(0.0) += contribution;
        }
    }

    if totals.len() <= TOP_N_CATEGORIES {
        return rows;
    }

    let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let keep: std::collections::HashSet<String> = ranked.into_iter().take(TOP_N_CATEGORIES).map(|(k, _)| k).collect();

    rows.into_iter().filter(|row| matches!(&row.values[c_idx], Value::Text(category) if keep.contains(category))).collect()
}

fn uniform_sample(rows: Vec<Row>, max_points: usize) -> Vec<Row> {
    if max_points == 0 || rows.is_empty() {
        return Vec::new();
    }
    let step = rows.len().div_ceil(max_points);
    rows.into_iter().step_by(step.max(1)).take(max_points).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, ty: CanonicalType) -> ColumnSchema {
        ColumnSchema { name: name.to_string(), declared_type: ty, masked: false }
    }

    #[test]
    fn uniform_sample_never_exceeds_max_points() {
        let rows: Vec<Row> = (0..1000).map(|i| Row { values: vec![Value::Int(i)] }).collect();
        let sampled = uniform_sample(rows, 100);
        assert!(sampled.len() <= 100);
    }

    #[test]
    fn rows_under_the_cap_pass_through_unchanged() {
        let columns = vec![column("n", CanonicalType::Int)];
        let rows: Vec<Row> = (0..5).map(|i| Row { values: vec![Value::Int(i)] }).collect();
        let (out_columns, out_rows) = aggregate(&columns, rows.clone(), 500);
        assert_eq!(out_rows.len(), rows.len());
        assert_eq!(out_columns.len(), columns.len());
    }

    #[test]
    fn categorical_column_beyond_top_n_is_filtered() {
        let columns = vec![column("category", CanonicalType::Text), column("value", CanonicalType::Int)];
        let rows: Vec<Row> = (0..200)
            .map(|i| Row { values: vec![Value::Text(format!("cat-{i}")), Value::Int(i)] })
            .collect();
        let (_, out_rows) = aggregate(&columns, rows, 1000);
        assert_eq!(out_rows.len(), TOP_N_CATEGORIES);
    }

    #[test]
    fn time_bucketing_sums_numeric_columns_per_bucket() {
        let columns = vec![column("day", CanonicalType::Timestamp), column("count", CanonicalType::Int)];
        let base = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let rows = vec![
            Row { values: vec![Value::Timestamp(base), Value::Int(3)] },
            Row { values: vec![Value::Timestamp(base), Value::Int(4)] },
        ];
        let (out_columns, out_rows) = aggregate(&columns, rows, 500);
        assert_eq!(out_columns.len(), 2);
        assert_eq!(out_rows.len(), 1);
        assert_eq!(out_rows[0].values[1], Value::Float(7.0));
    }
}
