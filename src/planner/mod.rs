//! Deterministic analysis planning from a dataset profile.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::profile::Profile;

/// Default number of tasks in a plan.
pub const DEFAULT_MAX_TASKS: usize = 5;

const MAX_HISTOGRAMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    BasicInfo,
    Histogram,
    CorrelationMatrix,
    ScatterMatrix,
    BarChart,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::BasicInfo => "basic_info",
            TaskType::Histogram => "histogram",
            TaskType::CorrelationMatrix => "correlation_matrix",
            TaskType::ScatterMatrix => "scatter_matrix",
            TaskType::BarChart => "bar_chart",
        }
    }

    /// Whether a successful run of this task is expected to leave a figure.
    pub fn expects_figure(self) -> bool {
        !matches!(self, TaskType::BasicInfo)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_type: TaskType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl Task {
    pub fn basic_info() -> Self {
        Self {
            task_type: TaskType::BasicInfo,
            description: "Show basic information about the dataset".into(),
            column: None,
            columns: Vec::new(),
        }
    }

    pub fn histogram(column: &str) -> Self {
        Self {
            task_type: TaskType::Histogram,
            description: format!("Histogram of {column}"),
            column: Some(column.to_string()),
            columns: Vec::new(),
        }
    }

    pub fn correlation_matrix() -> Self {
        Self {
            task_type: TaskType::CorrelationMatrix,
            description: "Correlation matrix of the numeric columns".into(),
            column: None,
            columns: Vec::new(),
        }
    }

    pub fn scatter_matrix(columns: &[&str]) -> Self {
        Self {
            task_type: TaskType::ScatterMatrix,
            description: "Scatter matrix of the numeric columns".into(),
            column: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn bar_chart(column: &str) -> Self {
        Self {
            task_type: TaskType::BarChart,
            description: format!("Distribution of {column} (bar chart)"),
            column: Some(column.to_string()),
            columns: Vec::new(),
        }
    }

    fn basic_info_pad(position: usize) -> Self {
        Self {
            description: format!("Show basic information about the dataset (task {position})"),
            ..Self::basic_info()
        }
    }
}

/// Ordered, fixed-length task list. Built once, then consumed by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    tasks: Vec<Task>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

/// Derives exactly `cap` tasks: basic info first, then up to three histograms
/// and a correlation matrix for numeric columns, then one bar chart per
/// categorical column, padded with basic-info tasks.
pub fn plan(profile: &Profile, cap: usize) -> Plan {
    let mut tasks = vec![Task::basic_info()];

    let numeric = profile.numeric_columns();
    for col in numeric.iter().take(MAX_HISTOGRAMS) {
        if tasks.len() < cap {
            tasks.push(Task::histogram(col));
        }
    }
    if numeric.len() > 1 && tasks.len() < cap {
        tasks.push(Task::correlation_matrix());
    }

    for col in profile.categorical_columns() {
        if tasks.len() >= cap {
            break;
        }
        tasks.push(Task::bar_chart(col));
    }

    tasks.truncate(cap);
    while tasks.len() < cap {
        let position = tasks.len() + 1;
        tasks.push(Task::basic_info_pad(position));
    }

    Plan { tasks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{CategoricalInfo, NumericStats};

    fn profile_with(numeric: &[&str], categorical: &[&str]) -> Profile {
        Profile {
            shape: (10, numeric.len() + categorical.len()),
            columns: numeric.iter().chain(categorical).map(|s| s.to_string()).collect(),
            dtypes: Vec::new(),
            null_counts: Vec::new(),
            duplicate_count: 0,
            memory_usage: 0,
            numeric_stats: numeric
                .iter()
                .map(|c| NumericStats {
                    column: c.to_string(),
                    count: 10,
                    mean: None,
                    std: None,
                    min: None,
                    q25: None,
                    q50: None,
                    q75: None,
                    max: None,
                })
                .collect(),
            categorical_info: categorical
                .iter()
                .map(|c| CategoricalInfo {
                    column: c.to_string(),
                    unique_count: 2,
                    top_values: Vec::new(),
                })
                .collect(),
        }
    }

    fn types(plan: &Plan) -> Vec<TaskType> {
        plan.iter().map(|t| t.task_type).collect()
    }

    #[test]
    fn three_numeric_columns() {
        let p = plan(&profile_with(&["a", "b", "c"], &[]), 5);
        use TaskType::*;
        assert_eq!(types(&p), vec![BasicInfo, Histogram, Histogram, Histogram, CorrelationMatrix]);
        assert_eq!(p.get(1).unwrap().column.as_deref(), Some("a"));
        assert_eq!(p.get(3).unwrap().column.as_deref(), Some("c"));
    }

    #[test]
    fn two_categorical_columns_pad_with_basic_info() {
        let p = plan(&profile_with(&[], &["city", "gender"]), 5);
        use TaskType::*;
        assert_eq!(types(&p), vec![BasicInfo, BarChart, BarChart, BasicInfo, BasicInfo]);
        assert_eq!(p.get(2).unwrap().column.as_deref(), Some("gender"));
        assert_ne!(p.get(3).unwrap().description, p.get(4).unwrap().description);
        assert_ne!(p.get(0).unwrap().description, p.get(3).unwrap().description);
    }

    #[test]
    fn single_numeric_column_gets_no_correlation() {
        let p = plan(&profile_with(&["a"], &["c"]), 5);
        use TaskType::*;
        assert_eq!(types(&p), vec![BasicInfo, Histogram, BarChart, BasicInfo, BasicInfo]);
    }

    #[test]
    fn length_always_equals_cap() {
        let profiles = [
            profile_with(&[], &[]),
            profile_with(&["a"], &[]),
            profile_with(&["a", "b", "c", "d", "e"], &["x", "y", "z"]),
            profile_with(&[], &["x", "y", "z", "w", "v", "u"]),
        ];
        for cap in [1, 3, 5, 10] {
            for p in &profiles {
                assert_eq!(plan(p, cap).len(), cap);
            }
        }
    }

    #[test]
    fn larger_cap_fills_with_categoricals_then_pads() {
        let p = plan(&profile_with(&["a", "b"], &["x"]), 7);
        use TaskType::*;
        assert_eq!(
            types(&p),
            vec![BasicInfo, Histogram, Histogram, CorrelationMatrix, BarChart, BasicInfo, BasicInfo]
        );
    }

    #[test]
    fn planning_is_deterministic() {
        let prof = profile_with(&["a", "b"], &["x", "y"]);
        assert_eq!(plan(&prof, 5), plan(&prof, 5));
    }

    #[test]
    fn task_type_serializes_snake_case() {
        let v = serde_json::to_value(Task::correlation_matrix()).unwrap();
        assert_eq!(v["task_type"], "correlation_matrix");
        assert!(v.get("column").is_none() && v.get("columns").is_none());
        let v = serde_json::to_value(Task::bar_chart("city")).unwrap();
        assert_eq!(v["column"], "city");
    }
}
