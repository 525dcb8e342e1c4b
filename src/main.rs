//! Entry point: load configuration, initialize logging, parse arguments,
//! dispatch to the matching CLI command.

use clap::Parser;

use swarm_core::cli;
use swarm_core::cli::types::Cli;
use swarm_core::infrastructure::config::{Config, ConfigLoader};
use swarm_core::infrastructure::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli_args = Cli::parse();

    let config: Config = match &cli_args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let _guard = logging::init(&config.logging)?;

    if let Err(e) = cli::dispatch(cli_args, &config).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
