//! Topology placement policy (§4.5): pure `(task, agents) -> Option<Id>`
//! functions, one per [`Topology`] variant, dispatched by [`place`].
//!
//! Kept free of any service state, in the same spirit as the teacher's
//! `priority_calculator.rs` stateless scoring functions — placement is a
//! deterministic query over a snapshot, never a side effect.

use crate::domain::models::{Agent, Capability, Id, Task, Topology};

/// True iff `agent` may execute `task` under the capability-match rule
/// (§4.5): required capabilities are a subset of the agent's, and the
/// preferred type (if any) matches.
fn is_capable(task: &Task, agent: &Agent) -> bool {
    agent.satisfies(&task.requirements.capabilities, task.requirements.preferred_type)
}

fn capable_idle_agents<'a>(task: &Task, agents: &'a [Agent]) -> Vec<&'a Agent> {
    agents
        .iter()
        .filter(|a| is_capable(task, a) && a.is_available())
        .collect()
}

fn least_loaded<'a>(candidates: &[&'a Agent]) -> Option<&'a Agent> {
    candidates.iter().min_by_key(|a| a.workload).copied()
}

/// `centralized`: decision-type tasks (those requiring [`Capability::Coordination`])
/// always go to the coordinator; everything else goes to the least-loaded
/// capable agent.
fn place_centralized(task: &Task, agents: &[Agent]) -> Option<Id> {
    if task.requirements.capabilities.contains(&Capability::Coordination) {
        return agents
            .iter()
            .find(|a| a.agent_type == crate::domain::models::AgentType::Coordinator && a.is_available())
            .map(|a| a.id.id());
    }
    let candidates = capable_idle_agents(task, agents);
    least_loaded(&candidates).map(|a| a.id.id())
}

/// `hierarchical`: restrict to agents whose declared layer is ≤ the task's
/// layer, then break ties by workload.
fn place_hierarchical(task: &Task, agents: &[Agent]) -> Option<Id> {
    let candidates: Vec<&Agent> = capable_idle_agents(task, agents)
        .into_iter()
        .filter(|a| a.layer <= task.requirements.layer)
        .collect();
    least_loaded(&candidates).map(|a| a.id.id())
}

/// `mesh`: any capable idle agent; ties broken by `(min workload, min
/// recent-failure-rate)`. The spec's third tiebreak, "random", is resolved
/// deterministically here by falling through to `Id` ordering — see
/// DESIGN.md's Open Question note.
fn place_mesh(task: &Task, agents: &[Agent]) -> Option<Id> {
    let candidates = capable_idle_agents(task, agents);
    candidates
        .into_iter()
        .min_by(|a, b| {
            a.workload
                .cmp(&b.workload)
                .then_with(|| failure_rate(a).total_cmp(&failure_rate(b)))
                .then_with(|| a.id.id().cmp(&b.id.id()))
        })
        .map(|a| a.id.id())
}

fn failure_rate(agent: &Agent) -> f64 {
    let total = agent.metrics.tasks_completed + agent.metrics.tasks_failed;
    if total == 0 {
        0.0
    } else {
        agent.metrics.tasks_failed as f64 / total as f64
    }
}

/// `hybrid`: start hierarchical; if the hierarchical candidate is at or
/// over its concurrency cap (i.e. none qualifies once capacity is
/// accounted for by [`Agent::is_available`]), fall back to mesh over the
/// same capability set.
fn place_hybrid(task: &Task, agents: &[Agent]) -> Option<Id> {
    place_hierarchical(task, agents).or_else(|| place_mesh(task, agents))
}

/// Dispatch to the configured topology's placement function.
pub fn place(topology: Topology, task: &Task, agents: &[Agent]) -> Option<Id> {
    match topology {
        Topology::Centralized => place_centralized(task, agents),
        Topology::Hierarchical => place_hierarchical(task, agents),
        Topology::Mesh => place_mesh(task, agents),
        Topology::Hybrid => place_hybrid(task, agents),
    }
}

/// Required-capabilities check exposed for the scheduler's "no capable
/// idle agent exists" park decision (§4.5 step 2).
pub fn any_capable(task: &Task, agents: &[Agent]) -> bool {
    agents.iter().any(|a| is_capable(task, a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        AgentId, AgentLimits, AgentStatus, AgentType, TaskPriority, TaskType,
    };
    use std::path::PathBuf;

    fn agent(agent_type: AgentType, workload: u32, layer: u32) -> Agent {
        let mut a = Agent::new(
            AgentId::new(Id::new(), agent_type, 0),
            format!("{:?}", agent_type),
            agent_type,
            agent_type.default_capabilities(),
            AgentLimits::default(),
            PathBuf::from("/tmp/ws"),
        )
        .with_layer(layer);
        a.status = AgentStatus::Idle;
        a.workload = workload;
        a
    }

    #[test]
    fn centralized_routes_coordination_tasks_to_coordinator() {
        let coordinator = agent(AgentType::Coordinator, 0, 0);
        let coder = agent(AgentType::Coder, 0, 1);
        let agents = vec![coordinator.clone(), coder];

        let mut task = Task::new("plan", "d", TaskType::Other, TaskPriority::Normal);
        task.requirements.capabilities = [Capability::Coordination].into_iter().collect();

        assert_eq!(place_centralized(&task, &agents), Some(coordinator.id.id()));
    }

    #[test]
    fn centralized_routes_other_tasks_to_least_loaded_capable() {
        let busy = agent(AgentType::Coder, 2, 1);
        let idle = agent(AgentType::Coder, 0, 1);
        let agents = vec![busy, idle.clone()];

        let task = Task::new("code", "d", TaskType::Coding, TaskPriority::Normal);
        assert_eq!(place_centralized(&task, &agents), Some(idle.id.id()));
    }

    #[test]
    fn hierarchical_excludes_agents_above_task_layer() {
        let shallow = agent(AgentType::Coder, 0, 0);
        let deep = agent(AgentType::Coder, 0, 5);
        let agents = vec![shallow, deep.clone()];

        let task = Task::new("code", "d", TaskType::Coding, TaskPriority::Normal).with_layer(5);
        assert_eq!(place_hierarchical(&task, &agents), Some(deep.id.id()));
    }

    #[test]
    fn hybrid_falls_back_to_mesh_when_no_hierarchical_candidate() {
        let shallow = agent(AgentType::Coder, 0, 10);
        let agents = vec![shallow.clone()];

        let task = Task::new("code", "d", TaskType::Coding, TaskPriority::Normal).with_layer(0);
        assert_eq!(place_hybrid(&task, &agents), Some(shallow.id.id()));
    }

    #[test]
    fn mesh_breaks_ties_by_workload_then_failure_rate() {
        let mut high_failure = agent(AgentType::Coder, 0, 0);
        high_failure.metrics.tasks_failed = 9;
        high_failure.metrics.tasks_completed = 1;
        let low_failure = agent(AgentType::Coder, 0, 0);
        let agents = vec![high_failure, low_failure.clone()];

        let task = Task::new("code", "d", TaskType::Coding, TaskPriority::Normal);
        assert_eq!(place_mesh(&task, &agents), Some(low_failure.id.id()));
    }

    #[test]
    fn no_capable_agent_returns_none() {
        let tester = agent(AgentType::Tester, 0, 0);
        let agents = vec![tester];
        let task = Task::new("code", "d", TaskType::Coding, TaskPriority::Normal);
        assert_eq!(place(Topology::Mesh, &task, &agents), None);
        assert!(!any_capable(&task, &agents));
    }
}
