//! In-memory tabular dataset: named, typed columns of equal length.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

pub mod io;

pub use io::{from_csv_reader, read_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Int64,
    Float64,
    Bool,
    Text,
}

impl ColumnKind {
    /// Type tag in pandas spelling, which is what the generated code sees.
    pub fn dtype(self) -> &'static str {
        match self {
            ColumnKind::Int64 => "int64",
            ColumnKind::Float64 => "float64",
            ColumnKind::Bool => "bool",
            ColumnKind::Text => "object",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Int64 | ColumnKind::Float64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Display form used for category labels and previews.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "NaN".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => if *b { "True".into() } else { "False".into() },
            Value::Text(s) => s.clone(),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Int(i) => json!(i),
            Value::Float(f) if f.is_finite() => json!(f),
            Value::Float(_) => JsonValue::Null,
            Value::Bool(b) => json!(b),
            Value::Text(s) => json!(s),
        }
    }

    /// Key used for equality checks across rows (duplicates, distinct counts).
    pub(crate) fn key(&self) -> String {
        match self {
            Value::Null => "\u{0}null".to_string(),
            Value::Int(i) => format!("i:{i}"),
            Value::Float(f) if f.is_nan() => "\u{0}null".to_string(),
            Value::Float(f) => format!("f:{}", f.to_bits()),
            Value::Bool(b) => format!("b:{b}"),
            Value::Text(s) => format!("s:{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// A rectangular table. The pipeline never mutates it; the sandbox receives a
/// serialized copy for each execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Builds a dataset, rejecting columns of unequal length.
    pub fn new(columns: Vec<Column>) -> Result<Self, String> {
        if let Some(first) = columns.first() {
            let rows = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != rows) {
                return Err(format!(
                    "column '{}' has {} values, expected {}",
                    bad.name,
                    bad.values.len(),
                    rows
                ));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0 || self.columns.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// First `n` rows, for previews.
    pub fn head(&self, n: usize) -> Vec<Vec<&Value>> {
        (0..self.row_count().min(n))
            .filter_map(|i| self.row(i))
            .collect()
    }

    pub fn total_nulls(&self) -> usize {
        self.columns.iter().map(Column::null_count).sum()
    }

    /// Column-oriented JSON copy handed to the sandbox interpreter.
    pub fn to_sandbox_payload(&self) -> Result<JsonValue, serde_json::Error> {
        let columns: Vec<PayloadColumn<'_>> = self
            .columns
            .iter()
            .map(|c| PayloadColumn {
                name: &c.name,
                dtype: c.kind.dtype(),
                values: c.values.iter().map(Value::to_json).collect(),
            })
            .collect();
        Ok(json!({ "columns": serde_json::to_value(columns)? }))
    }
}

#[derive(Serialize)]
struct PayloadColumn<'a> {
    name: &'a str,
    dtype: &'static str,
    values: Vec<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new("age", ColumnKind::Int64, vec![Value::Int(30), Value::Int(41)]),
            Column::new(
                "city",
                ColumnKind::Text,
                vec![Value::Text("Tokyo".into()), Value::Null],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::new(vec![
            Column::new("a", ColumnKind::Int64, vec![Value::Int(1)]),
            Column::new("b", ColumnKind::Int64, vec![]),
        ])
        .unwrap_err();
        assert!(err.contains("'b'"));
    }

    #[test]
    fn shape_and_rows() {
        let ds = sample();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column_count(), 2);
        assert_eq!(ds.row(1).unwrap()[0], &Value::Int(41));
        assert!(ds.row(2).is_none());
        assert_eq!(ds.total_nulls(), 1);
        assert_eq!(ds.head(10).len(), 2);
    }

    #[test]
    fn empty_dataset_has_no_rows() {
        let ds = Dataset::default();
        assert_eq!(ds.row_count(), 0);
        assert!(ds.is_empty());
    }

    #[test]
    fn payload_is_column_oriented_with_dtypes() {
        let payload = sample().to_sandbox_payload().unwrap();
        let cols = payload["columns"].as_array().unwrap();
        assert_eq!(cols[0]["dtype"], "int64");
        assert_eq!(cols[1]["dtype"], "object");
        assert_eq!(cols[1]["values"][1], JsonValue::Null);
    }

    #[test]
    fn nan_counts_as_null() {
        assert!(Value::Float(f64::NAN).is_null());
        assert_eq!(Value::Float(f64::NAN).key(), Value::Null.key());
    }
}
