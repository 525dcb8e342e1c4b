//! Shared memory snapshot writer: the `shared-memory.json` external
//! contract (§6) — a periodic dump of the swarm's agents, tasks, and
//! communication log, written atomically so external readers never see a
//! torn file. The coordinator writes one at least once, on termination.

use serde::Serialize;

use crate::domain::error::CoreResult;
use crate::domain::models::{
    Agent, CoordinationEvent, SwarmObjective, Task, Topology,
};
use crate::services::workspace_manager::{atomic_write, WorkspacePaths};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentSummary<'a> {
    id: String,
    name: &'a str,
    #[serde(rename = "type")]
    agent_type: crate::domain::models::AgentType,
    status: crate::domain::models::AgentStatus,
    workspace_dir: &'a std::path::Path,
    last_heartbeat: chrono::DateTime<chrono::Utc>,
    metrics: &'a crate::domain::models::AgentMetrics,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskSummary<'a> {
    id: crate::domain::models::Id,
    name: &'a str,
    #[serde(rename = "type")]
    task_type: crate::domain::models::TaskType,
    status: crate::domain::models::TaskStatus,
    dependencies: &'a [crate::domain::models::Id],
    assigned_to: Option<crate::domain::models::Id>,
    attempts: usize,
    priority: crate::domain::models::TaskPriority,
}

#[derive(Serialize)]
struct CommunicationLogEntry {
    ts: chrono::DateTime<chrono::Utc>,
    agent: String,
    action: String,
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct Metadata<'a> {
    topology: Topology,
    strategy: crate::domain::models::Strategy,
    objective: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Coordination {
    communication_log: Vec<CommunicationLogEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SharedMemorySnapshot<'a> {
    swarm_id: crate::domain::models::Id,
    created_at: chrono::DateTime<chrono::Utc>,
    status: crate::domain::models::ObjectiveStatus,
    metadata: Metadata<'a>,
    agents: Vec<AgentSummary<'a>>,
    tasks: Vec<TaskSummary<'a>>,
    coordination: Coordination,
}

/// Build and atomically write `shared-memory.json` for one swarm run (§6).
pub fn write_shared_memory_snapshot(
    paths: &WorkspacePaths,
    objective: &SwarmObjective,
    topology: Topology,
    agents: &[Agent],
    tasks: &[Task],
    events: &[CoordinationEvent],
) -> CoreResult<()> {
    let snapshot = SharedMemorySnapshot {
        swarm_id: objective.swarm_id,
        created_at: objective.created_at,
        status: objective.status,
        metadata: Metadata {
            topology,
            strategy: objective.strategy,
            objective: &objective.description,
        },
        agents: agents
            .iter()
            .map(|a| AgentSummary {
                id: a.id.to_string(),
                name: &a.name,
                agent_type: a.agent_type,
                status: a.status,
                workspace_dir: &a.workspace_dir,
                last_heartbeat: a.metrics.last_activity,
                metrics: &a.metrics,
            })
            .collect(),
        tasks: tasks
            .iter()
            .map(|t| TaskSummary {
                id: t.id,
                name: &t.name,
                task_type: t.task_type,
                status: t.status,
                dependencies: &t.dependencies,
                assigned_to: t.current_agent,
                attempts: t.attempts.len(),
                priority: t.priority,
            })
            .collect(),
        coordination: Coordination {
            communication_log: events
                .iter()
                .map(|e| CommunicationLogEntry {
                    ts: e.ts,
                    agent: format!("{:?}", e.actor),
                    action: event_action(&e.kind),
                    details: serde_json::to_value(&e.kind).ok(),
                })
                .collect(),
        },
    };

    let json = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| crate::domain::error::CoreError::IoError(e.to_string()))?;
    atomic_write(&paths.shared_memory_file, &json)
}

fn event_action(kind: &crate::domain::models::EventKind) -> String {
    // `EventKind` is a closed, field-carrying enum (§9 "typed events over
    // ad-hoc strings") — the variant name alone is the action label, the
    // payload is reproduced in `details`.
    let debug = format!("{kind:?}");
    debug
        .split(|c: char| c == ' ' || c == '{')
        .next()
        .unwrap_or(&debug)
        .to_string()
}
