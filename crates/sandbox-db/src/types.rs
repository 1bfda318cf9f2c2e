use serde::{Deserialize, Serialize};

/// Vendor-agnostic data type exposed to consumers. Every connector maps
/// its native type codes onto this closed enumeration (§4.2: "canonical
/// types are what consumers see") — generalized from the teacher's
/// Postgres-only `DatabaseType`/`JsonbValue` pair into a vendor-neutral
/// row-value enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalType {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
    Json,
}

/// A single cell value, tagged with its canonical type on the wire via
/// `serde`'s externally-tagged default (kept simple: consumers match on
/// the variant, not a separate type field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Json(serde_json::Value),
}

impl Value {
    #[must_use]
    pub fn canonical_type(&self) -> CanonicalType {
        match self {
            Self::Null => CanonicalType::Null,
            Self::Bool(_) => CanonicalType::Bool,
            Self::Int(_) => CanonicalType::Int,
            Self::Float(_) => CanonicalType::Float,
            Self::Text(_) => CanonicalType::Text,
            Self::Bytes(_) => CanonicalType::Bytes,
            Self::Timestamp(_) => CanonicalType::Timestamp,
            Self::Json(_) => CanonicalType::Json,
        }
    }

    /// Best-effort stringification, used by the masker (which only
    /// operates on string-shaped values) and by diagnostics.
    #[must_use]
    pub fn as_display_string(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// One column in a result schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub declared_type: CanonicalType,
    pub masked: bool,
}

/// One row, positional over its schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}
