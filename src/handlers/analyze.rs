//! Full analysis run: preview, pipeline, rendering and optional export.

use std::sync::Arc;

use anyhow::{bail, Result};
use is_terminal::IsTerminal;
use tracing::{info, warn};

use crate::{
    cli::AnalyzeArgs,
    config::{Config, PipelineSettings},
    execution::{CodeRunner, PythonSandbox},
    export::write_outcome,
    llm::{LlmClient, OfflineGenerator, TextGenerator},
    pipeline::{load_dataset, AnalysisOutcome, Controller},
    printer::{preview_markdown, print_markdown, print_outcome, TextPrinter},
};

/// Config values overlaid with whatever the command line set explicitly.
pub fn settings_for(args: &AnalyzeArgs, cfg: &Config) -> PipelineSettings {
    let mut s = PipelineSettings::from_config(cfg);
    if let Some(n) = args.max_tasks {
        s.max_tasks = n;
    }
    if let Some(n) = args.max_retries {
        s.retry_limit = n;
    }
    if let Some(n) = args.recursion_limit {
        s.step_limit = n;
    }
    if let Some(p) = &args.python {
        s.sandbox.python = p.clone();
    }
    if let Some(secs) = args.exec_timeout {
        s.sandbox.timeout = std::time::Duration::from_secs(secs);
    }
    s
}

fn generator_for(args: &AnalyzeArgs, cfg: &Config) -> Result<Arc<dyn TextGenerator>> {
    if args.offline {
        info!("offline mode: using baseline code and fallback report");
        return Ok(Arc::new(OfflineGenerator));
    }
    let client = LlmClient::from_config(cfg)?;
    if !client.has_api_key() {
        warn!("OPENAI_API_KEY is not set; continuing offline");
        return Ok(Arc::new(OfflineGenerator));
    }
    let mut opts = client.options().clone();
    if let Some(m) = &args.model {
        opts.model = m.clone();
    }
    if let Some(t) = args.temperature {
        opts.temperature = t;
    }
    info!(model = %opts.model, "using language model");
    Ok(Arc::new(client.with_options(opts)))
}

pub async fn run(args: &AnalyzeArgs, cfg: &Config) -> Result<()> {
    let md = if args.no_md {
        false
    } else if args.md {
        true
    } else {
        cfg.get_bool("PRETTIFY_MARKDOWN") && std::io::stdout().is_terminal()
    };

    let settings = settings_for(args, cfg);
    let runner: Arc<dyn CodeRunner> = Arc::new(PythonSandbox::new(settings.sandbox.clone()));
    let controller = Controller::new(generator_for(args, cfg)?, runner, cfg, settings);

    let outcome = match load_dataset(&args.input.input) {
        Ok(dataset) => {
            print_markdown(&preview_markdown(&dataset), md);
            controller.run(&dataset).await
        }
        Err(e) => AnalysisOutcome::failure(&e),
    };

    print_outcome(&outcome, md);

    if let Some(dir) = &args.out {
        let written = write_outcome(dir, &outcome)?;
        TextPrinter { color: Some("cyan") }
            .print(&format!("Wrote {} file(s) to {}", written.len(), dir.display()));
    }

    if !outcome.success {
        bail!(outcome.error.unwrap_or_else(|| "analysis failed".into()));
    }
    Ok(())
}
