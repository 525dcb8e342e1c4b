//! `swarm cancel <objective-id>`. Same in-process caveat as `status`
//! (see `cli::commands::status`).

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::output::{render, CommandOutput};
use crate::domain::models::Id;
use crate::infrastructure::config::Config;
use crate::services::{CoreRuntime, SwarmCoordinator};

#[derive(Serialize)]
struct CancelOutput {
    objective_id: String,
    requested: bool,
}

impl CommandOutput for CancelOutput {
    fn to_human(&self) -> String {
        format!("cancel requested for objective {}", self.objective_id)
    }
}

pub async fn handle(config: &Config, objective_id: String, json: bool) -> Result<()> {
    let uuid = Uuid::parse_str(&objective_id)?;
    let options = config.to_swarm_options()?;
    let runtime = Arc::new(CoreRuntime::new(options, config.llm_cli_path.clone(), config.llm_cli_default_tools.clone()));
    let coordinator = SwarmCoordinator::new(runtime);

    coordinator.cancel(Id::from_uuid(uuid)).await?;
    render(
        &CancelOutput {
            objective_id,
            requested: true,
        },
        json,
    );
    Ok(())
}
