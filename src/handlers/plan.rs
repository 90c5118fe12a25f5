//! Plan preview: profile and plan without executing anything.

use anyhow::Result;
use is_terminal::IsTerminal;

use crate::{
    cli::PlanArgs,
    config::{Config, PipelineSettings},
    pipeline::load_dataset,
    planner::plan,
    printer::{plan_markdown, print_markdown},
    profile::profile,
};

pub fn run(args: &PlanArgs, cfg: &Config) -> Result<()> {
    let dataset = load_dataset(&args.input.input)?;
    let cap = args
        .max_tasks
        .unwrap_or_else(|| PipelineSettings::from_config(cfg).max_tasks);
    let md = cfg.get_bool("PRETTIFY_MARKDOWN") && std::io::stdout().is_terminal();
    print_markdown(&plan_markdown(&plan(&profile(&dataset), cap)), md);
    Ok(())
}
