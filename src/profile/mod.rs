//! Dataset profiling: structure, missing values and descriptive statistics.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, ColumnKind, Dataset, Value};

/// Number of most frequent values kept per categorical column.
pub const TOP_VALUES: usize = 5;

const INDEX_BYTES: usize = 128;
const PY_STR_OVERHEAD: usize = 49;
const POINTER_BYTES: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// (rows, columns)
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub dtypes: Vec<ColumnTag>,
    pub null_counts: Vec<ColumnCount>,
    pub duplicate_count: usize,
    pub memory_usage: usize,
    pub numeric_stats: Vec<NumericStats>,
    pub categorical_info: Vec<CategoricalInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTag {
    pub column: String,
    pub dtype: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCount {
    pub column: String,
    pub count: usize,
}

/// Descriptive statistics of a numeric column. Quartiles use linear
/// interpolation; `std` is the sample deviation and is absent below two values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub q50: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalInfo {
    pub column: String,
    pub unique_count: usize,
    pub top_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

impl Profile {
    pub fn row_count(&self) -> usize {
        self.shape.0
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.numeric_stats.iter().map(|s| s.column.as_str()).collect()
    }

    pub fn categorical_columns(&self) -> Vec<&str> {
        self.categorical_info.iter().map(|c| c.column.as_str()).collect()
    }

    pub fn null_count(&self, column: &str) -> Option<usize> {
        self.null_counts
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.count)
    }

    pub fn total_nulls(&self) -> usize {
        self.null_counts.iter().map(|c| c.count).sum()
    }
}

/// Summarizes a dataset without touching it. Total over every input, including
/// zero rows, zero columns and all-null columns.
pub fn profile(dataset: &Dataset) -> Profile {
    let columns = dataset.columns();

    let mut numeric_stats = Vec::new();
    let mut categorical_info = Vec::new();
    for col in columns {
        if col.kind.is_numeric() {
            numeric_stats.push(describe(col));
        } else if col.kind == ColumnKind::Text {
            categorical_info.push(categorize(col));
        }
    }

    Profile {
        shape: (dataset.row_count(), dataset.column_count()),
        columns: dataset.column_names(),
        dtypes: columns
            .iter()
            .map(|c| ColumnTag {
                column: c.name.clone(),
                dtype: c.kind.dtype().to_string(),
            })
            .collect(),
        null_counts: columns
            .iter()
            .map(|c| ColumnCount {
                column: c.name.clone(),
                count: c.null_count(),
            })
            .collect(),
        duplicate_count: duplicate_rows(dataset),
        memory_usage: memory_usage(dataset),
        numeric_stats,
        categorical_info,
    }
}

fn describe(col: &Column) -> NumericStats {
    let mut values: Vec<f64> = col.values.iter().filter_map(Value::as_f64).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let count = values.len();

    let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);
    let std = match (mean, count) {
        (Some(m), n) if n > 1 => {
            let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
            Some((ss / (n - 1) as f64).sqrt())
        }
        _ => None,
    };

    NumericStats {
        column: col.name.clone(),
        count,
        mean,
        std,
        min: values.first().copied(),
        q25: quantile(&values, 0.25),
        q50: quantile(&values, 0.5),
        q75: quantile(&values, 0.75),
        max: values.last().copied(),
    }
}

/// Linear interpolation between closest ranks on sorted input.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn categorize(col: &Column) -> CategoricalInfo {
    // counts in first-appearance order so the stable sort breaks ties deterministically
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in col.values.iter().filter(|v| !v.is_null()) {
        let label = v.render();
        let entry = counts.entry(label.clone()).or_insert_with(|| {
            order.push(label);
            0
        });
        *entry += 1;
    }

    let mut ranked: Vec<ValueCount> = order
        .into_iter()
        .map(|value| {
            let count = counts.get(&value).copied().unwrap_or(0);
            ValueCount { value, count }
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    let unique_count = ranked.len();
    ranked.truncate(TOP_VALUES);

    CategoricalInfo {
        column: col.name.clone(),
        unique_count,
        top_values: ranked,
    }
}

fn duplicate_rows(dataset: &Dataset) -> usize {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    (0..dataset.row_count())
        .filter_map(|i| dataset.row(i))
        .filter(|row| !seen.insert(row.iter().map(|v| v.key()).collect()))
        .count()
}

/// Rough equivalent of a deep memory count for the same frame in pandas.
fn memory_usage(dataset: &Dataset) -> usize {
    let cells: usize = dataset
        .columns()
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Int64 | ColumnKind::Float64 => c.values.len() * 8,
            ColumnKind::Bool => c.values.len(),
            ColumnKind::Text => c
                .values
                .iter()
                .map(|v| match v {
                    Value::Text(s) => POINTER_BYTES + PY_STR_OVERHEAD + s.len(),
                    _ => POINTER_BYTES + 16,
                })
                .sum(),
        })
        .sum();
    INDEX_BYTES + cells
}
