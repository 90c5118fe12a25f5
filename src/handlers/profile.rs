//! Data preview and profile dump.

use anyhow::Result;
use is_terminal::IsTerminal;

use crate::{
    cli::InputArgs,
    config::Config,
    pipeline::load_dataset,
    printer::{preview_markdown, print_markdown},
    profile::profile,
};

pub fn run(args: &InputArgs, cfg: &Config) -> Result<()> {
    let dataset = load_dataset(&args.input)?;
    let md = cfg.get_bool("PRETTIFY_MARKDOWN") && std::io::stdout().is_terminal();
    print_markdown(&preview_markdown(&dataset), md);
    println!("{}", serde_json::to_string_pretty(&profile(&dataset))?);
    Ok(())
}
