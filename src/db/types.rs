//! Row and value types shared by every backend.
//!
//! Each adapter maps its driver's native row representation into these types
//! so the orchestrator and exporter never see engine-specific data.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// A result row: column name to value, in the column order the backend reported.
///
/// Duplicate column names collapse onto one key, the last one wins.
pub type Row = IndexMap<String, Value>;

/// Builds a row from `(column, value)` pairs.
pub fn row_from_pairs<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Represents a single value from a database query.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value. Also carries decimals, temporals, and other
    /// types that have no lossless native mapping.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

/// Maps a text read of a column to a value, reading the raw bytes instead
/// when the column is not valid UTF-8.
pub(crate) fn text_or_bytes<E>(
    text: std::result::Result<Option<String>, E>,
    bytes: impl FnOnce() -> Option<Vec<u8>>,
) -> Value {
    match text {
        Ok(Some(s)) => Value::String(s),
        Ok(None) => Value::Null,
        Err(_) => bytes().map(Value::Bytes).unwrap_or(Value::Null),
    }
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(v.to_string()))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
