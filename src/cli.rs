use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "eda-agent", about = "Automated exploratory data analysis for CSV files", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error). RUST_LOG wins when set.
    #[arg(long = "log-level", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Profile, plan, run every task in the sandbox and write a report.
    Analyze(AnalyzeArgs),

    /// Print a data preview and the dataset profile as JSON.
    Profile(InputArgs),

    /// Print the task plan without executing anything.
    Plan(PlanArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// CSV file to analyze.
    #[arg(value_name = "CSV")]
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Number of tasks in the plan.
    #[arg(long = "max-tasks")]
    pub max_tasks: Option<usize>,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("md_switch").args(["md", "no_md"]).multiple(false)))]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated output.
    #[arg(long, value_parser = clap::value_parser!(f32))]
    pub temperature: Option<f32>,

    /// Number of tasks in the plan.
    #[arg(long = "max-tasks")]
    pub max_tasks: Option<usize>,

    /// Revisions allowed per task after its first failure.
    #[arg(long = "max-retries")]
    pub max_retries: Option<u32>,

    /// Ceiling on pipeline steps for the whole run.
    #[arg(long = "recursion-limit")]
    pub recursion_limit: Option<usize>,

    /// Python interpreter used by the sandbox.
    #[arg(long)]
    pub python: Option<String>,

    /// Wall-clock limit per code execution, in seconds.
    #[arg(long = "exec-timeout")]
    pub exec_timeout: Option<u64>,

    /// Skip the language model; run on baseline code and fallback texts.
    #[arg(long)]
    pub offline: bool,

    /// Write report.md, results.json, profile.json and figures/ into DIR.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Prettify the Markdown report.
    #[arg(long)]
    pub md: bool,
    /// Print the report as plain text.
    #[arg(long = "no-md")]
    pub no_md: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
