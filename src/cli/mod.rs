//! Command-line interface: argument parsing and per-command handlers.

pub mod commands;
pub mod output;
pub mod types;

use anyhow::Result;

use crate::infrastructure::config::Config;
use types::{Cli, Commands};

pub async fn dispatch(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Commands::Run {
            objective,
            strategy,
            topology,
            max_agents,
        } => commands::run::handle(config, objective, strategy, topology, max_agents, cli.json).await,
        Commands::Status { objective_id } => commands::status::handle(config, objective_id, cli.json).await,
        Commands::Cancel { objective_id } => commands::cancel::handle(config, objective_id, cli.json).await,
    }
}
