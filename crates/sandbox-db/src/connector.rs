use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use sandbox_error::RuntimeError;

use crate::types::{ColumnSchema, Row, Value};

/// Result of a single non-streaming `execute`.
#[derive(Debug, Clone)]
pub struct RawQueryResult {
    pub columns: Vec<ColumnSchema>,
    pub rows: Vec<Row>,
}

/// One batch of a streamed result, carrying the same schema every time.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub columns: Vec<ColumnSchema>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone)]
pub struct TableSummary {
    pub schema: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ColumnDescription {
    pub name: String,
    pub declared_type: crate::types::CanonicalType,
    pub nullable: bool,
}

pub type RowStream = Pin<Box<dyn Stream<Item = Result<RowBatch, RuntimeError>> + Send>>;

/// The per-vendor connector contract (§4.2). A connection handle
/// (`conn: &mut Self::Connection`) is opaque to callers — `sandbox-sql`
/// only ever holds it behind a [`crate::pool::PooledConnection`] guard.
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
    type Connection: Send;

    async fn open(&self, descriptor: &crate::descriptor::ConnectionDescriptor) -> Result<Self::Connection, RuntimeError>;

    async fn close(&self, conn: Self::Connection) -> Result<(), RuntimeError>;

    async fn probe(&self, conn: &mut Self::Connection) -> bool;

    /// `row_limit`, when set, bounds the number of rows the connector
    /// fetches from the driver for this statement (§4.4 "fetch at most
    /// max-rows + 1 to detect truncation") — the cap is applied at the
    /// SQL layer, not after the fact, so a capped query never materializes
    /// more of the underlying result set than the caller asked for.
    async fn execute(
        &self,
        conn: &mut Self::Connection,
        statement: &str,
        bindings: &HashMap<String, Value>,
        row_limit: Option<u64>,
    ) -> Result<RawQueryResult, RuntimeError>;

    async fn stream(
        &self,
        conn: &mut Self::Connection,
        statement: &str,
        bindings: &HashMap<String, Value>,
        batch_size: usize,
        row_limit: Option<u64>,
    ) -> Result<RowStream, RuntimeError>;

    async fn list_tables(&self, conn: &mut Self::Connection, schema: Option<&str>) -> Result<Vec<TableSummary>, RuntimeError>;

    async fn describe_table(
        &self,
        conn: &mut Self::Connection,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Vec<ColumnDescription>, RuntimeError>;
}

/// Wraps `statement` in a bounding outer `SELECT` so the driver itself
/// never returns more than `row_limit` rows — shared by every connector
/// so the cap is enforced identically regardless of vendor (§4.4).
#[must_use]
pub fn apply_row_limit(statement: &str, row_limit: u64) -> String {
    let trimmed = statement.trim().trim_end_matches(';').trim();
    format!("SELECT * FROM ({trimmed}) AS sandbox_row_limit LIMIT {row_limit}")
}

/// Rewrites `:name` placeholders into a vendor's native positional style,
/// returning the rewritten statement plus an ordered binding list matching
/// each occurrence. Shared by every connector — a small pure function,
/// unit-tested independently of any live connection (§4.2 "Parameter
/// protocol").
#[must_use]
pub fn rewrite_named_placeholders(
    statement: &str,
    bindings: &HashMap<String, Value>,
    native_placeholder: impl Fn(usize) -> String,
) -> (String, Vec<Value>) {
    let mut output = String::with_capacity(statement.len());
    let mut ordered = Vec::new();
    let chars: Vec<char> = statement.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ':' && i + 1 < chars.len() && (chars[i + 1].is_ascii_alphabetic() || chars[i + 1] == '_') {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            let name: String = chars[start..end].iter().collect();
            if let Some(value) = bindings.get(&name) {
                ordered.push(value.clone());
                output.push_str(&native_placeholder(ordered.len()));
                i = end;
                continue;
            }
        }
        output.push(chars[i]);
        i += 1;
    }
    (output, ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_named_placeholders_in_occurrence_order() {
        let mut bindings = HashMap::new();
        bindings.insert("id".to_string(), Value::Int(1));
        bindings.insert("name".to_string(), Value::Text("alice".to_string()));

        let (rewritten, ordered) =
            rewrite_named_placeholders("SELECT * FROM t WHERE id = :id AND name = :name", &bindings, |n| format!("${n}"));

        assert_eq!(rewritten, "SELECT * FROM t WHERE id = $1 AND name = $2");
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0], Value::Int(1));
        assert_eq!(ordered[1], Value::Text("alice".to_string()));
    }

    #[test]
    fn repeated_name_reuses_the_same_positional_slot_order() {
        let mut bindings = HashMap::new();
        bindings.insert("x".to_string(), Value::Int(7));
        let (rewritten, ordered) = rewrite_named_placeholders(":x + :x", &bindings, |n| format!("${n}"));
        assert_eq!(rewritten, "$1 + $2");
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn unknown_placeholder_is_left_untouched() {
        let bindings = HashMap::new();
        let (rewritten, ordered) = rewrite_named_placeholders("SELECT :missing", &bindings, |n| format!("${n}"));
        assert_eq!(rewritten, "SELECT :missing");
        assert!(ordered.is_empty());
    }
}
