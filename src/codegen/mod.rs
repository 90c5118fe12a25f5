//! Code synthesis: deterministic baseline snippets per task, optionally
//! improved or repaired through a [`TextGenerator`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    llm::TextGenerator,
    planner::{Task, TaskType},
    profile::Profile,
    role::{default_role_text, DefaultRole},
};

/// Python literal for an arbitrary column name. JSON string syntax is a
/// subset of Python's, so the escaped form is always a valid literal.
fn py_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "''".to_string())
}

/// Column name as it may appear inside a `#` comment: control characters,
/// line terminators included, become spaces so the comment cannot end early.
fn comment_text(s: &str) -> String {
    s.chars().map(|c| if c.is_control() { ' ' } else { c }).collect()
}

/// Baseline snippet for `task`. Figure-producing snippets bind `fig` and never
/// render it.
pub fn baseline_code(task: &Task) -> String {
    match task.task_type {
        TaskType::BasicInfo => BASIC_INFO.trim_start().to_string(),
        TaskType::Histogram => match task.column.as_deref() {
            Some(col) => {
                let c = py_str(col);
                format!(
                    "# Histogram of {col}\n\
import plotly.express as px\n\
fig = px.histogram(df, x={c}, title=\"Distribution of \" + {c})\n\
print(\"Histogram created: \" + {c})\n",
                    col = comment_text(col)
                )
            }
            None => noop(task),
        },
        TaskType::CorrelationMatrix => CORRELATION.trim_start().to_string(),
        TaskType::ScatterMatrix => {
            let dims = if task.columns.is_empty() {
                "df.select_dtypes(include=['number']).columns.tolist()".to_string()
            } else {
                let lits: Vec<String> = task.columns.iter().map(|c| py_str(c)).collect();
                format!("[{}]", lits.join(", "))
            };
            format!(
                "# Scatter matrix\n\
import plotly.express as px\n\
dimensions = {dims}\n\
fig = px.scatter_matrix(df, dimensions=dimensions, title=\"Scatter matrix\")\n"
            )
        }
        TaskType::BarChart => match task.column.as_deref() {
            Some(col) => {
                let c = py_str(col);
                format!(
                    "# Distribution of {col} (bar chart)\n\
import plotly.express as px\n\
value_counts = df[{c}].value_counts().head(10)\n\
fig = px.bar(x=value_counts.index.astype(str), y=value_counts.values,\n\
             title=\"Distribution of \" + {c} + \" (top 10)\",\n\
             labels={{'x': {c}, 'y': 'count'}})\n\
print(\"Bar chart created: \" + {c})\n",
                    col = comment_text(col)
                )
            }
            None => noop(task),
        },
    }
}

fn noop(task: &Task) -> String {
    format!("# {}: nothing to do without a target column\n", task.task_type)
}

const BASIC_INFO: &str = r#"
# Basic information about the dataset
print("=== Basic information ===")
print(f"Shape: {df.shape}")
print(f"Columns: {list(df.columns)}")
print("\n=== Data types ===")
print(df.dtypes)
print("\n=== Missing values ===")
print(df.isnull().sum())
print("\n=== Summary statistics ===")
print(df.describe())

import plotly.graph_objects as go

null_counts = df.isnull().sum()
if null_counts.sum() > 0:
    fig = go.Figure(data=[go.Bar(x=list(null_counts.index.astype(str)), y=list(null_counts.values))])
    fig.update_layout(title="Missing values per column", xaxis_title="Column", yaxis_title="Missing")
else:
    dtype_counts = df.dtypes.astype(str).value_counts()
    fig = go.Figure(data=[go.Pie(labels=list(dtype_counts.index), values=list(dtype_counts.values))])
    fig.update_layout(title="Data type distribution")
print("Overview chart created")
"#;

const CORRELATION: &str = r#"
# Correlation matrix
import plotly.express as px
numeric_cols = df.select_dtypes(include=['number']).columns
if len(numeric_cols) > 1:
    corr_matrix = df[numeric_cols].corr()
    fig = px.imshow(corr_matrix, text_auto=True, aspect="auto",
                    title="Correlation between numeric columns")
    print("Correlation matrix created")
else:
    print("A correlation matrix needs at least two numeric columns")
"#;

/// Body of the first fenced block tagged `python` (or `py`), else of the first
/// untagged fenced block. An unterminated fence runs to the end of the text.
pub fn extract_code_block(response: &str) -> Option<String> {
    let blocks = fenced_blocks(response);
    blocks
        .iter()
        .find(|(tag, _)| tag.eq_ignore_ascii_case("python") || tag.eq_ignore_ascii_case("py"))
        .or_else(|| blocks.iter().find(|(tag, _)| tag.is_empty()))
        .map(|(_, body)| body.trim().to_string())
}

fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        let after = &rest[start + 3..];
        let (inner, next) = match after.find("```") {
            Some(end) => (&after[..end], &after[end + 3..]),
            None => (after, ""),
        };
        let tag_len = inner.find(char::is_whitespace).unwrap_or(inner.len());
        out.push((&inner[..tag_len], &inner[tag_len..]));
        rest = next;
    }
    out
}

/// Wraps the text-generation collaborator for the two code paths.
pub struct CodeSynthesizer {
    generator: Arc<dyn TextGenerator>,
    coder_role: String,
    debugger_role: String,
}

impl CodeSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, cfg: &Config) -> Self {
        Self {
            generator,
            coder_role: default_role_text(cfg, DefaultRole::Coder),
            debugger_role: default_role_text(cfg, DefaultRole::Debugger),
        }
    }

    /// Deterministic baseline for `task`.
    pub fn synthesize(&self, task: &Task) -> String {
        baseline_code(task)
    }

    /// Asks the collaborator to improve `baseline`. Falls back to the
    /// baseline when the call fails or the answer carries no fenced block.
    pub async fn enhance(&self, task: &Task, profile: &Profile, baseline: &str) -> String {
        let prompt = format!(
            "Analysis task:\n{}\n\nData summary:\n{}\n\nBaseline code:\n{}\n\n\
Improve this baseline into more effective, insightful analysis code.",
            pretty(task),
            pretty(profile),
            baseline
        );
        match self.generator.generate(&self.coder_role, &prompt).await {
            Ok(text) => match extract_code_block(&text) {
                Some(code) if !code.is_empty() => {
                    info!(task_type = %task.task_type, "code enhanced");
                    code
                }
                _ => {
                    info!(task_type = %task.task_type, "no code block in response, using baseline");
                    baseline.to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "code enhancement failed, using baseline");
                baseline.to_string()
            }
        }
    }

    /// Asks the collaborator to repair `code`. `None` means the call failed
    /// and the caller keeps the failing code.
    pub async fn revise(&self, code: &str, error: &str, profile: &Profile) -> Option<String> {
        let prompt = format!(
            "Code that failed:\n```python\n{code}\n```\n\nError message:\n{error}\n\n\
Data summary:\n{}\n\nFix the error and return the corrected code.",
            pretty(profile)
        );
        match self.generator.generate(&self.debugger_role, &prompt).await {
            Ok(text) => {
                let revised = extract_code_block(&text).unwrap_or_else(|| text.trim().to_string());
                info!("code revised");
                Some(revised)
            }
            Err(e) => {
                warn!(error = %e, "code revision failed, keeping previous code");
                None
            }
        }
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unavailable: {e}>"))
}
