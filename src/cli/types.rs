//! Command-line argument grammar (clap derive).

use clap::{Parser, Subcommand};

use crate::domain::models::{Strategy, Topology};

#[derive(Debug, Parser)]
#[command(name = "swarm", version, about = "Multi-agent swarm orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit machine-readable JSON instead of a formatted table.
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a config file to load instead of the default hierarchy.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decompose an objective, spin up an agent team, and run it to completion.
    Run {
        /// Free-text description of what the swarm should accomplish.
        objective: String,

        /// Decomposition strategy. Defaults to auto-detection from the objective text.
        #[arg(long, value_enum, default_value = "auto")]
        strategy: StrategyArg,

        /// Placement topology overriding the configured default.
        #[arg(long, value_enum)]
        topology: Option<TopologyArg>,

        /// Cap on the number of agents the team may contain.
        #[arg(long)]
        max_agents: Option<usize>,
    },

    /// Print the current status of a running or finished objective.
    Status {
        /// Objective id returned by `run` (only meaningful within the same process run).
        objective_id: String,
    },

    /// Cancel a running objective and every non-terminal task it owns.
    Cancel {
        objective_id: String,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StrategyArg {
    Auto,
    Research,
    Development,
    Analysis,
    Testing,
    Optimization,
    Maintenance,
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Auto => Strategy::Auto,
            StrategyArg::Research => Strategy::Research,
            StrategyArg::Development => Strategy::Development,
            StrategyArg::Analysis => Strategy::Analysis,
            StrategyArg::Testing => Strategy::Testing,
            StrategyArg::Optimization => Strategy::Optimization,
            StrategyArg::Maintenance => Strategy::Maintenance,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum TopologyArg {
    Centralized,
    Hierarchical,
    Mesh,
    Hybrid,
}

impl From<TopologyArg> for Topology {
    fn from(value: TopologyArg) -> Self {
        match value {
            TopologyArg::Centralized => Topology::Centralized,
            TopologyArg::Hierarchical => Topology::Hierarchical,
            TopologyArg::Mesh => Topology::Mesh,
            TopologyArg::Hybrid => Topology::Hybrid,
        }
    }
}
