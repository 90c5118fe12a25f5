//! Error types for the analysis pipeline.
//!
//! Only [`PipelineError`] ever ends a run. Code failures inside the sandbox are
//! reported as failed [`crate::execution::ExecutionAttempt`]s and text
//! generation failures fall back to deterministic defaults, so neither of
//! those crosses a stage boundary as an error.

use thiserror::Error;

/// Fatal errors. These abort the run and surface as a failed outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Dataset copy could not be created: {0}")]
    DatasetCopy(String),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Step budget of {limit} exceeded")]
    StepBudgetExceeded { limit: usize },

    #[error("Invalid transition: event '{event}' in stage '{stage}'")]
    InvalidTransition { stage: String, event: String },
}

/// Host-level executor failures (the interpreter itself, not the user code).
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to spawn interpreter '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("Interpreter bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Dataset copy failed: {0}")]
    DatasetCopy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Text generation failures. Always recoverable.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({status})")]
    Api { status: u16 },

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Text generation is disabled (offline mode)")]
    Offline,
}

/// Errors raised while ingesting delimited text.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Row {line} has {found} fields, expected {expected}")]
    Ragged {
        line: u64,
        expected: usize,
        found: usize,
    },
}
