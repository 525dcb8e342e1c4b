//! `swarm status <objective-id>`.
//!
//! The coordinator's objective registry lives in process memory (§3
//! ownership rules never prescribe a cross-process store for it), so this
//! command only ever sees objectives started by the same invocation that
//! queries it. Useful for an embedder driving the coordinator directly, or
//! a future daemon front-end; a bare `swarm run` followed by a separate
//! `swarm status` process will always report "not found".

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::output::{render, CommandOutput};
use crate::domain::models::Id;
use crate::infrastructure::config::Config;
use crate::services::{CoreRuntime, Snapshot, SwarmCoordinator};

#[derive(Serialize)]
struct StatusOutput {
    found: bool,
    snapshot: Option<Snapshot>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        match &self.snapshot {
            None => "no such objective in this process".to_string(),
            Some(s) => format!(
                "objective {} status: {:?}\n  tasks:  {} total\n  agents: {} total\n  events: {} recorded",
                s.objective.id.short(),
                s.objective.status,
                s.tasks.len(),
                s.agents.len(),
                s.recent_events.len(),
            ),
        }
    }
}

pub async fn handle(config: &Config, objective_id: String, json: bool) -> Result<()> {
    let uuid = Uuid::parse_str(&objective_id)?;
    let options = config.to_swarm_options()?;
    let runtime = Arc::new(CoreRuntime::new(options, config.llm_cli_path.clone(), config.llm_cli_default_tools.clone()));
    let coordinator = SwarmCoordinator::new(runtime);

    let snapshot = coordinator.get_status(Id::from_uuid(uuid)).await;
    let output = StatusOutput {
        found: snapshot.is_some(),
        snapshot,
    };
    render(&output, json);
    Ok(())
}
