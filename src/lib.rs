//! Automated exploratory data analysis over CSV files.
//!
//! A run profiles the dataset, plans a fixed number of analysis tasks, turns
//! each task into Python code, executes it in a process-isolated sandbox with
//! bounded revisions on failure, and finishes with a narrative report. The
//! sequencing lives in [`pipeline`] as an explicit state machine.

pub mod cli;
pub mod codegen;
pub mod config;
pub mod dataset;
pub mod error;
pub mod execution;
pub mod export;
pub mod handlers;
pub mod llm;
pub mod pipeline;
pub mod planner;
pub mod printer;
pub mod process;
pub mod profile;
pub mod role;
