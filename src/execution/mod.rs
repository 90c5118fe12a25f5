//! Execution engine: attempt/result types, binding classification and the
//! [`CodeRunner`] seam.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{dataset::Dataset, error::SandboxError, planner::Task};

pub mod python;

pub use python::PythonSandbox;

/// Builtins the executed code may call. Anything else fails to resolve.
pub const ALLOWED_BUILTINS: &[&str] = &[
    "len", "range", "enumerate", "zip", "map", "filter", "sum", "min", "max", "abs", "round",
    "int", "float", "str", "bool", "list", "dict", "tuple", "set", "print", "type",
    "isinstance", "getattr", "hasattr", "setattr", "delattr", "dir", "vars", "sorted",
    "reversed", "any", "all", "Exception", "ValueError", "KeyError", "TypeError",
    "IndexError", "ZeroDivisionError",
];

/// Top-level packages `import` may load inside the sandbox.
pub const ALLOWED_IMPORTS: &[&str] = &[
    "pandas", "numpy", "plotly", "matplotlib", "seaborn", "scipy", "sklearn",
];

/// Names bound before the code runs: library handles and the dataset copy.
pub const PRELUDE_NAMES: &[&str] = &["pd", "np", "px", "go", "ff", "df"];

/// A chart produced by one execution, addressable by its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub name: String,
    /// Runtime type of the object, e.g. `plotly.graph_objs._figure.Figure`.
    pub kind: String,
    /// Exported chart specification; `Null` when the object could not be exported.
    pub spec: serde_json::Value,
}

/// What an attempt left behind, most informative first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Figure,
    Text,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub code: String,
    pub success: bool,
    /// Captured stdout on success; the captured stderr on failure.
    pub stdout: String,
    pub error: String,
    pub figures: Vec<Figure>,
    pub variables: BTreeMap<String, String>,
    pub artifact: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl ExecutionAttempt {
    pub fn failed(code: &str, error: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            success: false,
            stdout: stderr.into(),
            error: error.into(),
            figures: Vec::new(),
            variables: BTreeMap::new(),
            artifact: ArtifactKind::None,
            notice: None,
        }
    }

    /// Sorts the new bindings into figures and auxiliary variables.
    pub fn succeeded(
        code: &str,
        stdout: String,
        bindings: Vec<Binding>,
        task: &Task,
        repr_limit: usize,
    ) -> Self {
        let mut figures = Vec::new();
        let mut variables = BTreeMap::new();
        for b in bindings {
            if is_figure(&b) {
                info!(name = %b.name, kind = %b.type_name, "figure found");
                figures.push(Figure {
                    name: b.name,
                    kind: b.type_name,
                    spec: b.spec.unwrap_or(serde_json::Value::Null),
                });
            } else {
                variables.insert(b.name, truncate_repr(&b.repr, repr_limit));
            }
        }

        let artifact = if !figures.is_empty() {
            ArtifactKind::Figure
        } else if !stdout.trim().is_empty() {
            ArtifactKind::Text
        } else {
            ArtifactKind::None
        };

        let notice = if figures.is_empty() && task.task_type.expects_figure() {
            let names: Vec<&str> = variables.keys().map(String::as_str).collect();
            warn!(task_type = %task.task_type, variables = ?names, "no figure found");
            Some(format!(
                "No figure found for {} task; new variables: [{}]",
                task.task_type,
                names.join(", ")
            ))
        } else {
            if figures.is_empty() {
                info!("basic info task completed");
            }
            None
        };

        Self {
            code: code.to_string(),
            success: true,
            stdout,
            error: String::new(),
            figures,
            variables,
            artifact,
            notice,
        }
    }
}

/// One name the executed code introduced, as reported by the interpreter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub has_data: bool,
    #[serde(default)]
    pub has_show: bool,
    #[serde(default)]
    pub has_to_dict: bool,
    #[serde(default)]
    pub repr: String,
    #[serde(default)]
    pub spec: Option<serde_json::Value>,
}

/// The one capability check for chart objects: a data payload, a render
/// trigger and a dictionary export, or a plotly figure/graph type tag.
pub fn is_figure(binding: &Binding) -> bool {
    let ty = binding.type_name.to_ascii_lowercase();
    let plotly_tagged = ty.contains("plotly") && (ty.contains("figure") || ty.contains("graph"));
    plotly_tagged || (binding.has_data && binding.has_show && binding.has_to_dict)
}

/// Keeps at most `limit` characters, never splitting a code point.
pub fn truncate_repr(repr: &str, limit: usize) -> String {
    match repr.char_indices().nth(limit) {
        Some((idx, _)) => repr[..idx].to_string(),
        None => repr.to_string(),
    }
}

/// Runs a code fragment against a private copy of the dataset.
///
/// Code failures come back as `Ok` attempts with `success == false`; an `Err`
/// means the host could not run anything at all.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn execute(
        &self,
        code: &str,
        dataset: &Dataset,
        task: &Task,
    ) -> Result<ExecutionAttempt, SandboxError>;
}
