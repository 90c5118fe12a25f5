use anyhow::Result;
use eda_agent::{
    cli::{Cli, Command},
    config::Config,
    handlers,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Priority: RUST_LOG env var > --log-level > "info"; logs go to stderr
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    let cfg = Config::load();

    match &args.command {
        Command::Analyze(a) => handlers::analyze::run(a, &cfg).await,
        Command::Profile(a) => handlers::profile::run(a, &cfg),
        Command::Plan(a) => handlers::plan::run(a, &cfg),
    }
}
