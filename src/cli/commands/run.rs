//! `swarm run <objective>`: decompose, spin up the team, and drive the run
//! to completion in this process.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::cli::output::{kv_table, render, CommandOutput};
use crate::cli::types::{StrategyArg, TopologyArg};
use crate::infrastructure::config::Config;
use crate::services::{CoreRuntime, ObjectiveResult, SwarmCoordinator};

#[derive(Serialize)]
struct RunOutput {
    result: ObjectiveResult,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let r = &self.result;
        let table = kv_table(&[
            ("objective", r.objective_id.short()),
            ("swarm", r.swarm_id.short()),
            ("status", format!("{:?}", r.status)),
            ("completed", r.tasks_completed.to_string()),
            ("failed", r.tasks_failed.to_string()),
            ("cancelled", r.tasks_cancelled.to_string()),
            ("duration", format!("{:.1}s", r.duration.as_secs_f64())),
        ]);
        table.to_string()
    }
}

pub async fn handle(
    config: &Config,
    objective: String,
    strategy: StrategyArg,
    topology: Option<TopologyArg>,
    max_agents: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut options = config.to_swarm_options()?;
    if let Some(topology) = topology {
        options.topology = topology.into();
    }
    if let Some(max_agents) = max_agents {
        options.max_agents = max_agents;
    }

    let runtime = Arc::new(CoreRuntime::new(
        options,
        config.llm_cli_path.clone(),
        config.llm_cli_default_tools.clone(),
    ));
    let coordinator = SwarmCoordinator::new(runtime);

    let result = coordinator.run_objective(objective, strategy.into()).await?;
    render(&RunOutput { result }, json);
    Ok(())
}
