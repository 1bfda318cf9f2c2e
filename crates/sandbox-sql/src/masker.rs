use globset::{Glob, GlobSet, GlobSetBuilder};

use sandbox_config::SecurityConfig;
use sandbox_db::{ColumnSchema, Row, Value};

const MASK_CHAR: char = '*';
const MASK_RUN_LEN: usize = 4;
const SHORT_VALUE_SENTINEL: &str = "****";

/// Deterministic redaction of values in columns whose name matches a
/// sensitive-column glob (§4.3). Globs are compiled once at construction
/// from configuration (`*password*`, `*ssn*`, …), via `globset` — the
/// natural Rust counterpart to Python's `fnmatch` used by the original
/// `DataMasker._pattern_to_regex`.
#[derive(Debug)]
pub struct Masker {
    sensitive: GlobSet,
    enabled: bool,
}

impl Masker {
    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.sensitive_column_globs {
            if let Ok(glob) = Glob::new(&pattern.to_lowercase()) {
                builder.add(glob);
            }
        }
        Self { sensitive: builder.build().expect("sensitive-column globs are configuration-validated"), enabled: config.mask_enabled }
    }

    #[must_use]
    pub fn is_sensitive_column(&self, column_name: &str) -> bool {
        self.enabled && self.sensitive.is_match(column_name.to_lowercase())
    }

    /// Applies the fixed masking rule to one value (§4.3): strings longer
    /// than 4 chars keep their first/last character with a fixed-length
    /// asterisk run between; strings of length ≤ 4 and non-string values
    /// become a fixed sentinel. Idempotent: `mask(mask(x)) == mask(x)`
    /// because a masked string is itself reported as sensitive and its
    /// shape doesn't change on a second pass (see proptest below).
    #[must_use]
    pub fn mask_value(&self, value: &Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::Text(s) => {
                let char_count = s.chars().count();
                if char_count > MASK_RUN_LEN {
                    let first = s.chars().next().unwrap_or_default();
                    let last = s.chars().last().unwrap_or_default();
                    let masked: String = std::iter::once(first)
                        .chain(std::iter::repeat(MASK_CHAR).take(MASK_RUN_LEN))
                        .chain(std::iter::once(last))
                        .collect();
                    Value::Text(masked)
                } else {
                    Value::Text(SHORT_VALUE_SENTINEL.to_string())
                }
            }
            _ => Value::Text(SHORT_VALUE_SENTINEL.to_string()),
        }
    }

    /// Applies masking to an entire result set: marks sensitive columns in
    /// the schema and redacts their values in every row. Non-sensitive
    /// columns and values are returned byte-identical to the input (§8
    /// invariant 3).
    #[must_use]
    pub fn mask_rows(&self, columns: &[ColumnSchema], rows: Vec<Row>) -> (Vec<ColumnSchema>, Vec<Row>) {
        if !self.enabled {
            return (columns.to_vec(), rows);
        }

        let sensitive_idx: Vec<bool> = columns.iter().map(|c| self.is_sensitive_column(&c.name)).collect();
        if !sensitive_idx.iter().any(|&s| s) {
            return (columns.to_vec(), rows);
        }

        let masked_columns: Vec<ColumnSchema> = columns
            .iter()
            .zip(&sensitive_idx)
            .map(|(c, &masked)| ColumnSchema { name: c.name.clone(), declared_type: c.declared_type, masked })
            .collect();

        let masked_rows: Vec<Row> = rows
            .into_iter()
            .map(|row| {
                let values = row
                    .values
                    .into_iter()
                    .enumerate()
                    .map(|(idx, value)| {
                        if sensitive_idx.get(idx).copied().unwrap_or(false) {
                            self.mask_value(&value)
                        } else {
                            value
                        }
                    })
                    .collect();
                Row { values }
            })
            .collect();

        (masked_columns, masked_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masker() -> Masker {
        Masker::from_config(&SecurityConfig::default())
    }

    #[test]
    fn password_column_is_detected_as_sensitive() {
        assert!(masker().is_sensitive_column("user_password"));
        assert!(masker().is_sensitive_column("PASSWORD"));
    }

    #[test]
    fn non_sensitive_column_is_not_masked() {
        assert!(!masker().is_sensitive_column("username"));
    }

    #[test]
    fn long_string_keeps_first_and_last_char() {
        let masked = masker().mask_value(&Value::Text("supersecret".to_string()));
        assert_eq!(masked, Value::Text("s****t".to_string()));
    }

    #[test]
    fn short_string_becomes_sentinel() {
        let masked = masker().mask_value(&Value::Text("abc".to_string()));
        assert_eq!(masked, Value::Text(SHORT_VALUE_SENTINEL.to_string()));
    }

    #[test]
    fn non_string_value_becomes_sentinel() {
        let masked = masker().mask_value(&Value::Int(42));
        assert_eq!(masked, Value::Text(SHORT_VALUE_SENTINEL.to_string()));
    }

    #[test]
    fn mask_rows_marks_schema_and_redacts_only_sensitive_columns() {
        let columns = vec![
            ColumnSchema { name: "username".to_string(), declared_type: sandbox_db::CanonicalType::Text, masked: false },
            ColumnSchema { name: "password".to_string(), declared_type: sandbox_db::CanonicalType::Text, masked: false },
        ];
        let rows = vec![Row { values: vec![Value::Text("alice".to_string()), Value::Text("hunter2pass".to_string())] }];

        let (masked_columns, masked_rows) = masker().mask_rows(&columns, rows);
        assert!(!masked_columns[0].masked);
        assert!(masked_columns[1].masked);
        assert_eq!(masked_rows[0].values[0], Value::Text("alice".to_string()));
        assert_ne!(masked_rows[0].values[1], Value::Text("hunter2pass".to_string()));
    }

    proptest::proptest! {
        #[test]
        fn masking_is_idempotent(s in "[a-zA-Z0-9]{0,40}") {
            let m = masker();
            let once = m.mask_value(&Value::Text(s));
            let twice = m.mask_value(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
