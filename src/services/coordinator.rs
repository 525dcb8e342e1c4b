//! Swarm Coordinator (C6): the facade that ties the Objective Decomposer,
//! Shared Coordination Store, Worker Process Supervisor, Workspace Manager
//! and Scheduler together into `runObjective`/`getStatus`/`cancel` and the
//! manual agent-lifecycle operations (§4.6).
//!
//! `CoreRuntime` bundles the long-lived, shared collaborators. It is built
//! once by the CLI entry point and handed to every `SwarmCoordinator` by
//! reference — there is deliberately no process-wide `static`, so a test (or
//! an embedder) can stand up several independent runtimes in one process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Notify, RwLock};

use crate::domain::error::CoreResult;
use crate::domain::models::{
    Actor, Agent, AgentId, AgentLimits, AgentStatus, AgentType, EventKind, Id, ObjectiveStatus,
    RetentionPolicy, Strategy, SwarmObjective, SwarmOptions, Task, TaskStatus,
};
use crate::services::decomposer::ObjectiveDecomposer;
use crate::services::scheduler::{Scheduler, WorkerCommand};
use crate::services::shared_store::SharedStore;
use crate::services::snapshot::write_shared_memory_snapshot;
use crate::services::supervisor::Supervisor;
use crate::services::workspace_manager::{AgentWorkspace, WorkspaceManager};

/// Long-lived collaborators shared across every objective run in this
/// process. Constructed once; the coordinator only ever borrows it.
pub struct CoreRuntime {
    pub store: Arc<SharedStore>,
    pub supervisor: Arc<Supervisor>,
    pub workspace: Arc<WorkspaceManager>,
    pub options: SwarmOptions,
    pub llm_cli_path: String,
    pub llm_cli_default_tools: Vec<String>,
}

impl CoreRuntime {
    pub fn new(options: SwarmOptions, llm_cli_path: impl Into<String>, llm_cli_default_tools: Vec<String>) -> Self {
        Self {
            store: Arc::new(SharedStore::new()),
            supervisor: Arc::new(Supervisor::new()),
            workspace: Arc::new(WorkspaceManager::new(options.workspace_root.clone())),
            options,
            llm_cli_path: llm_cli_path.into(),
            llm_cli_default_tools,
        }
    }
}

/// Outcome of a single `runObjective` call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ObjectiveResult {
    pub objective_id: Id,
    pub swarm_id: Id,
    pub status: ObjectiveStatus,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub tasks_cancelled: usize,
    pub duration: Duration,
}

/// Point-in-time view of an objective and the agents/tasks it owns, for
/// `getStatus` (§4.6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Snapshot {
    pub objective: SwarmObjective,
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
    pub recent_events: Vec<crate::domain::models::CoordinationEvent>,
}

struct ObjectiveEntry {
    objective: SwarmObjective,
    cancel: Arc<Notify>,
}

/// Facade over one swarm run's lifecycle. Cheap to construct; holds no
/// state beyond an in-memory registry of objectives started through it, so
/// `getStatus`/`cancel` only see objectives this coordinator itself started.
pub struct SwarmCoordinator {
    runtime: Arc<CoreRuntime>,
    decomposer: ObjectiveDecomposer,
    objectives: RwLock<HashMap<Id, ObjectiveEntry>>,
}

impl SwarmCoordinator {
    pub fn new(runtime: Arc<CoreRuntime>) -> Self {
        Self {
            runtime,
            decomposer: ObjectiveDecomposer::new(),
            objectives: RwLock::new(HashMap::new()),
        }
    }

    /// Decompose `description` into a task graph and agent team, register
    /// both with the shared store, then drive the scheduler until the
    /// objective finishes, times out, or is cancelled.
    pub async fn run_objective(&self, description: impl Into<String>, strategy: Strategy) -> CoreResult<ObjectiveResult> {
        let description = description.into();
        let swarm_id = Id::new();
        let decomposed = self
            .decomposer
            .decompose(&description, strategy, self.runtime.options.max_agents as u32);

        let paths = self.runtime.workspace.create_swarm_workspace(swarm_id).await?;

        let mut instance_counts: HashMap<AgentType, u32> = HashMap::new();
        for profile in &decomposed.team {
            let instance = *instance_counts
                .entry(profile.agent_type)
                .and_modify(|n| *n += 1)
                .or_insert(0);
            let agent_id = AgentId::new(swarm_id, profile.agent_type, instance);
            let limits = AgentLimits {
                max_concurrent_tasks: self.runtime.options.max_concurrent_tasks_per_agent,
                timeout_per_task: self.runtime.options.task_timeout,
                memory_cap_mb: None,
            };
            let workspace_dir = paths.agents_dir.join(agent_id.id().to_string());
            let mut agent = Agent::new(agent_id, profile.name.clone(), profile.agent_type, profile.capabilities.clone(), limits, workspace_dir)
                .with_layer(profile.layer);
            agent.status = AgentStatus::Idle;
            self.runtime.store.register_agent(agent).await;
        }

        let task_ids: Vec<Id> = decomposed.tasks.iter().map(|t| t.id).collect();
        for task in decomposed.tasks {
            let task = task
                .with_timeout(self.runtime.options.task_timeout)
                .with_max_attempts(self.runtime.options.retry_policy.max_attempts);
            self.runtime.store.add_task(task).await;
        }

        let objective = SwarmObjective::new(swarm_id, description.clone(), strategy, task_ids.clone());
        let objective_id = objective.id;
        let cancel = Arc::new(Notify::new());
        self.objectives.write().await.insert(
            objective_id,
            ObjectiveEntry {
                objective: objective.clone(),
                cancel: cancel.clone(),
            },
        );

        let scheduler = Scheduler::new(
            self.runtime.store.clone(),
            self.runtime.supervisor.clone(),
            self.runtime.workspace.clone(),
            self.runtime.options.topology,
            self.runtime.options.retry_policy,
        )
        .with_max_running_tasks(self.runtime.options.max_agents as u32 * self.runtime.options.max_concurrent_tasks_per_agent);

        let cmd = WorkerCommand {
            executable: self.runtime.llm_cli_path.clone(),
            default_allowed_tools: self.runtime.llm_cli_default_tools.clone(),
            swarm_id,
            objective: description.clone(),
            strategy: strategy.as_str().to_string(),
        };

        let started = Instant::now();
        let run_fut = scheduler.run(&paths, &cmd);
        tokio::pin!(run_fut);

        let status = tokio::select! {
            res = &mut run_fut => {
                match res {
                    Ok(()) => self.classify_completion(&task_ids).await,
                    Err(_) => ObjectiveStatus::Failed,
                }
            }
            _ = tokio::time::sleep(self.runtime.options.swarm_timeout) => {
                self.runtime.store.push_event(Actor::Coordinator, EventKind::SwarmTimedOut).await;
                scheduler.cancel_all().await?;
                ObjectiveStatus::TimedOut
            }
            _ = cancel.notified() => {
                scheduler.cancel_all().await?;
                ObjectiveStatus::Cancelled
            }
        };

        let (tasks_completed, tasks_failed, tasks_cancelled) = self.tally(&task_ids).await;

        let finished_objective = {
            let mut entries = self.objectives.write().await;
            let entry = entries.get_mut(&objective_id).expect("objective registered at the top of run_objective");
            entry.objective.finish(status);
            entry.objective.clone()
        };

        self.write_snapshot(&paths, &finished_objective, swarm_id, &task_ids).await;
        self.teardown_workspaces(swarm_id).await;

        Ok(ObjectiveResult {
            objective_id,
            swarm_id,
            status,
            tasks_completed,
            tasks_failed,
            tasks_cancelled,
            duration: started.elapsed(),
        })
    }

    async fn classify_completion(&self, task_ids: &[Id]) -> ObjectiveStatus {
        let relevant: HashSet<Id> = task_ids.iter().copied().collect();
        let tasks = self.runtime.store.list_tasks().await;
        let any_failed = tasks
            .iter()
            .any(|t| relevant.contains(&t.id) && t.status == TaskStatus::Failed);
        if any_failed {
            ObjectiveStatus::Failed
        } else {
            ObjectiveStatus::Completed
        }
    }

    async fn tally(&self, task_ids: &[Id]) -> (usize, usize, usize) {
        let relevant: HashSet<Id> = task_ids.iter().copied().collect();
        let tasks = self.runtime.store.list_tasks().await;
        let mut completed = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        for t in tasks.iter().filter(|t| relevant.contains(&t.id)) {
            match t.status {
                TaskStatus::Completed => completed += 1,
                TaskStatus::Failed => failed += 1,
                TaskStatus::Cancelled => cancelled += 1,
                _ => {}
            }
        }
        (completed, failed, cancelled)
    }

    /// Dump `shared-memory.json` for this swarm (§6: "at least once on swarm
    /// termination"). Best-effort — a write failure is logged, never fails
    /// the objective whose result is otherwise already decided.
    async fn write_snapshot(
        &self,
        paths: &crate::services::workspace_manager::WorkspacePaths,
        objective: &SwarmObjective,
        swarm_id: Id,
        task_ids: &[Id],
    ) {
        let relevant: HashSet<Id> = task_ids.iter().copied().collect();
        let agents: Vec<Agent> = self
            .runtime
            .store
            .list_agents()
            .await
            .into_iter()
            .filter(|a| a.id.swarm == swarm_id)
            .collect();
        let tasks: Vec<Task> = self
            .runtime
            .store
            .list_tasks()
            .await
            .into_iter()
            .filter(|t| relevant.contains(&t.id))
            .collect();
        let events = self.runtime.store.recent_events(crate::services::shared_store::EVENT_LOG_CAP).await;

        if let Err(e) = write_shared_memory_snapshot(paths, objective, self.runtime.options.topology, &agents, &tasks, &events) {
            tracing::warn!(swarm_id = %swarm_id, error = %e, "failed to write shared-memory.json snapshot");
        }
    }

    /// Best-effort cleanup of every agent workspace under `swarm_id`
    /// according to the configured retention policy (§4.1). A teardown
    /// failure for one agent never blocks the others.
    async fn teardown_workspaces(&self, swarm_id: Id) {
        let policy = self.runtime.options.retain_workspaces;
        if policy == RetentionPolicy::Keep {
            return;
        }
        for agent in self.runtime.store.list_agents().await {
            if agent.id.swarm != swarm_id {
                continue;
            }
            let dir = agent.workspace_dir.clone();
            let workspace = AgentWorkspace {
                prompt_path: dir.join("enhanced-prompt.md"),
                info_path: dir.join("workspace-info.json"),
                dir,
            };
            if let Err(e) = self.runtime.workspace.teardown_agent_workspace(&workspace, policy).await {
                tracing::warn!(agent = %agent.id, error = %e, "failed to tear down agent workspace");
            }
        }
    }

    /// `getStatus(objectiveId) -> Snapshot` (§4.6).
    pub async fn get_status(&self, objective_id: Id) -> Option<Snapshot> {
        let entries = self.objectives.read().await;
        let entry = entries.get(&objective_id)?;
        let objective = entry.objective.clone();
        let relevant: HashSet<Id> = objective.tasks.iter().copied().collect();
        let tasks = self
            .runtime
            .store
            .list_tasks()
            .await
            .into_iter()
            .filter(|t| relevant.contains(&t.id))
            .collect();
        let agents = self
            .runtime
            .store
            .list_agents()
            .await
            .into_iter()
            .filter(|a| a.id.swarm == objective.swarm_id)
            .collect();
        let recent_events = self.runtime.store.recent_events(100).await;
        Some(Snapshot {
            objective,
            agents,
            tasks,
            recent_events,
        })
    }

    /// `cancel(objectiveId)` (§4.6). A no-op if the objective has already
    /// finished or was never started through this coordinator.
    pub async fn cancel(&self, objective_id: Id) -> CoreResult<()> {
        let mut entries = self.objectives.write().await;
        if let Some(entry) = entries.get_mut(&objective_id) {
            if !entry.objective.status.is_terminal() {
                entry.objective.status = ObjectiveStatus::Cancelling;
                entry.cancel.notify_one();
            }
        }
        Ok(())
    }

    /// `spawnAgent(swarmId, agentType, name)` (§4.6): register an additional
    /// live agent mid-run, outside the team the decomposer originally
    /// proposed.
    pub async fn spawn_agent(&self, swarm_id: Id, agent_type: AgentType, name: impl Into<String>) -> CoreResult<AgentId> {
        let existing = self.runtime.store.list_agents().await;
        let instance = existing
            .iter()
            .filter(|a| a.id.swarm == swarm_id && a.id.agent_type == agent_type)
            .count() as u32;
        let agent_id = AgentId::new(swarm_id, agent_type, instance);
        let paths = self.runtime.workspace.create_swarm_workspace(swarm_id).await?;
        let limits = AgentLimits {
            max_concurrent_tasks: self.runtime.options.max_concurrent_tasks_per_agent,
            timeout_per_task: self.runtime.options.task_timeout,
            memory_cap_mb: None,
        };
        let workspace_dir = paths.agents_dir.join(agent_id.id().to_string());
        let mut agent = Agent::new(agent_id, name, agent_type, agent_type.default_capabilities(), limits, workspace_dir);
        agent.status = AgentStatus::Idle;
        self.runtime.store.register_agent(agent).await;
        self.runtime.store.wake.notify_waiters();
        Ok(agent_id)
    }

    /// `terminateAgent(agentId)` (§4.6).
    pub async fn terminate_agent(&self, agent_id: Id) -> CoreResult<()> {
        self.runtime.store.terminate_agent(agent_id).await
    }

    /// `listAgents()` (§4.6).
    pub async fn list_agents(&self) -> Vec<Agent> {
        self.runtime.store.list_agents().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Capability;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn runtime(workspace_root: impl Into<std::path::PathBuf>) -> Arc<CoreRuntime> {
        let mut options = SwarmOptions::default();
        options.workspace_root = workspace_root.into();
        options.swarm_timeout = Duration::from_secs(5);
        options.task_timeout = Duration::from_secs(5);
        Arc::new(CoreRuntime::new(options, "/bin/true", vec![]))
    }

    #[tokio::test]
    async fn get_status_is_none_for_unknown_objective() {
        let dir = tempdir().unwrap();
        let coordinator = SwarmCoordinator::new(runtime(dir.path()));
        assert!(coordinator.get_status(Id::new()).await.is_none());
    }

    #[tokio::test]
    async fn spawn_and_terminate_agent_round_trip() {
        let dir = tempdir().unwrap();
        let coordinator = SwarmCoordinator::new(runtime(dir.path()));
        let swarm_id = Id::new();
        let agent_id = coordinator
            .spawn_agent(swarm_id, AgentType::Coder, "extra-coder")
            .await
            .unwrap();
        let agents = coordinator.list_agents().await;
        assert!(agents.iter().any(|a| a.id == agent_id));

        coordinator.terminate_agent(agent_id.id()).await.unwrap();
        let agents = coordinator.list_agents().await;
        let terminated = agents.iter().find(|a| a.id == agent_id).unwrap();
        assert_eq!(terminated.status, AgentStatus::Terminated);
    }

    #[tokio::test]
    async fn cancel_of_unknown_objective_is_a_harmless_no_op() {
        let dir = tempdir().unwrap();
        let coordinator = SwarmCoordinator::new(runtime(dir.path()));
        assert!(coordinator.cancel(Id::new()).await.is_ok());
    }

    #[tokio::test]
    async fn run_objective_drains_to_a_terminal_status() {
        let dir = tempdir().unwrap();
        let coordinator = SwarmCoordinator::new(runtime(dir.path()));
        let result = coordinator
            .run_objective("write a hello world script", Strategy::Development)
            .await
            .unwrap();
        assert!(result.status.is_terminal());
    }

    #[tokio::test]
    async fn unknown_capability_requirement_is_reported_as_failed_status() {
        // Exercise classify_completion directly against a store holding one
        // terminally-failed task, bypassing the full decomposition pipeline.
        let dir = tempdir().unwrap();
        let rt = runtime(dir.path());
        let coordinator = SwarmCoordinator::new(rt.clone());
        let mut task = Task::new(
            "impossible",
            "needs a capability nobody has",
            crate::domain::models::TaskType::Coding,
            crate::domain::models::TaskPriority::Normal,
        );
        task.requirements.capabilities = BTreeSet::from([Capability::CodeGeneration]);
        let task_id = task.id;
        rt.store.add_task(task).await;
        rt.store.promote_ready_tasks().await.unwrap();
        rt.store
            .mark_task_failed(task_id, crate::domain::models::ErrorKind::CapabilityUnmet)
            .await
            .unwrap();
        let status = coordinator.classify_completion(&[task_id]).await;
        assert_eq!(status, ObjectiveStatus::Failed);
    }
}
