//! Scheduler / Dispatcher (C5): drives the task graph to completion by
//! dispatching ready tasks to capable agents under the configured topology.
//!
//! Grounded on `dependency_resolver.rs`'s cycle-detection/topological-sort
//! code for pre-flight graph validation, and the teacher's
//! `is_transient()`/`is_permanent()` const-fn classification pattern
//! (mirrored here via [`crate::domain::models::ErrorKind::is_retriable`])
//! for the retry-vs-fail decision in the main loop's step 5.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{
    Actor, AgentId, Capability, ErrorKind, EventKind, Id, RetryPolicy, Task, TaskResult,
    TaskResultMetrics, Topology,
};
use crate::services::placement;
use crate::services::shared_store::SharedStore;
use crate::services::supervisor::{ExitOutcome, Supervisor, WorkerSpec};
use crate::services::workspace_manager::{AgentWorkspace, WorkspaceManager, WorkspacePaths};

/// Loop iterations a ready task may go undispatched before its priority is
/// bumped a tier (§4.5 Fairness).
pub const DEFAULT_STARVATION_THRESHOLD: u32 = 20;
/// Backoff between empty polling iterations while waiting on a wake signal
/// that never arrives (defensive — the store always wakes on completion).
const POLL_FALLBACK_INTERVAL: Duration = Duration::from_millis(250);

/// Per-task command-building context the scheduler needs in order to spawn
/// a worker (§6 worker protocol).
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub executable: String,
    pub default_allowed_tools: Vec<String>,
    pub swarm_id: Id,
    pub objective: String,
    pub strategy: String,
}

/// Cap on total outstanding workers across the whole swarm (§4.5
/// Backpressure). `None` means "sum of per-agent caps", computed live.
#[derive(Debug, Clone, Copy)]
pub struct Backpressure {
    pub max_running_tasks: Option<u32>,
}

pub struct Scheduler {
    store: Arc<SharedStore>,
    supervisor: Arc<Supervisor>,
    workspace: Arc<WorkspaceManager>,
    topology: Topology,
    retry_policy: RetryPolicy,
    backpressure: Backpressure,
    starvation_threshold: u32,
}

impl Scheduler {
    pub fn new(
        store: Arc<SharedStore>,
        supervisor: Arc<Supervisor>,
        workspace: Arc<WorkspaceManager>,
        topology: Topology,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            supervisor,
            workspace,
            topology,
            retry_policy,
            backpressure: Backpressure { max_running_tasks: None },
            starvation_threshold: DEFAULT_STARVATION_THRESHOLD,
        }
    }

    pub fn with_max_running_tasks(mut self, cap: u32) -> Self {
        self.backpressure.max_running_tasks = Some(cap);
        self
    }

    pub fn with_starvation_threshold(mut self, n: u32) -> Self {
        self.starvation_threshold = n;
        self
    }

    fn running_cap(&self, agents: &[crate::domain::models::Agent]) -> u32 {
        self.backpressure
            .max_running_tasks
            .unwrap_or_else(|| agents.iter().map(|a| a.limits.max_concurrent_tasks).sum())
    }

    /// Drive the swarm to completion: returns once the task graph is fully
    /// drained (every task terminal). Callers wrap this in
    /// `tokio::time::timeout` for the swarm-level deadline (§4.5
    /// Termination) and race it against an external cancel signal.
    pub async fn run(&self, paths: &WorkspacePaths, cmd: &WorkerCommand) -> CoreResult<()> {
        self.store.promote_ready_tasks().await?;
        let mut starvation: HashMap<Id, u32> = HashMap::new();

        loop {
            let ready = self.store.get_ready_tasks().await;
            let agents = self.store.list_agents().await;
            let running = self.store.total_workload().await;

            if ready.is_empty() {
                if running == 0 {
                    return Ok(());
                }
                self.wait_for_wake().await;
                continue;
            }

            let cap = self.running_cap(&agents);
            let mut capacity = cap.saturating_sub(running);
            let mut dispatched_any = false;

            for task in &ready {
                if capacity == 0 {
                    break;
                }
                let agents = self.store.list_agents().await;
                match placement::place(self.topology, task, &agents) {
                    Some(agent_id) => {
                        self.dispatch(task, agent_id, paths, cmd).await?;
                        starvation.remove(&task.id);
                        dispatched_any = true;
                        capacity -= 1;
                    }
                    None if placement::any_capable(task, &agents) => {
                        let count = starvation.entry(task.id).or_insert(0);
                        *count += 1;
                        if *count >= self.starvation_threshold {
                            self.store.bump_task_priority(task.id).await?;
                            starvation.remove(&task.id);
                        }
                    }
                    None => {
                        self.fail_unplaceable(task.id).await?;
                        dispatched_any = true;
                    }
                }
            }

            if !dispatched_any {
                self.wait_for_wake().await;
            }
        }
    }

    async fn wait_for_wake(&self) {
        tokio::select! {
            _ = self.store.wake.notified() => {}
            _ = tokio::time::sleep(POLL_FALLBACK_INTERVAL) => {}
        }
    }

    /// No agent type can ever satisfy this task's capability requirements
    /// (§7 `capability-unmet`, non-retriable). Fail permanently and cascade
    /// cancellation to dependents. No attempt was ever started, so
    /// `mark_task_failed` records the failure with no attempt history —
    /// `is_exhausted()` still resolves correctly off the non-retriable kind.
    async fn fail_unplaceable(&self, task_id: Id) -> CoreResult<()> {
        self.store.mark_task_failed(task_id, ErrorKind::CapabilityUnmet).await?;
        self.store.cancel_dependents_of_failed().await?;
        Ok(())
    }

    /// Steps 3-5 of the main loop for one task/agent pairing: assign, spawn,
    /// and register a background continuation that finalizes the task once
    /// the worker exits.
    async fn dispatch(
        &self,
        task: &Task,
        agent_id: Id,
        paths: &WorkspacePaths,
        cmd: &WorkerCommand,
    ) -> CoreResult<()> {
        self.store.mark_task_assigned(task.id, agent_id).await?;
        self.store.increment_agent_workload(agent_id).await?;
        self.store.start_task_attempt(task.id, agent_id).await?;

        let agent = self
            .store
            .get_agent(agent_id)
            .await
            .ok_or_else(|| CoreError::AgentNotFound(agent_id.to_string()))?;

        let workspace = self
            .workspace
            .create_agent_workspace(paths, &agent.id, Some(task.task_type.as_str().to_string()))
            .await?;

        let prompt = build_prompt(task, cmd);
        self.workspace.write_prompt(&workspace, prompt.clone()).await?;

        let allowed_tools = if cmd.default_allowed_tools.is_empty() {
            capabilities_as_tools(&task.requirements.capabilities)
        } else {
            cmd.default_allowed_tools.clone()
        };

        let spec = build_worker_spec(&agent.id, &workspace, &prompt, &allowed_tools, cmd, task);
        let handle = self.supervisor.spawn(spec).await?;

        self.store
            .push_event(
                Actor::Supervisor,
                EventKind::WorkerSpawned { worker_id: handle.id, task_id: task.id },
            )
            .await;

        self.store.mark_task_running(task.id).await?;

        let store = self.store.clone();
        let workspace_mgr = self.workspace.clone();
        let retry_policy = self.retry_policy;
        let worker_id = handle.id;
        let task_id = task.id;
        let success_requires_any_file = task.task_type.success_requires_any_file();
        let attempts_before = task.attempts.len() as u32;

        tokio::spawn(async move {
            let outcome = handle.wait().await;

            store
                .push_event(
                    Actor::Supervisor,
                    EventKind::WorkerExited { worker_id, success: outcome.success },
                )
                .await;
            if outcome.timed_out {
                store.push_event(Actor::Supervisor, EventKind::WorkerTimedOut { worker_id }).await;
            }

            let harvested = workspace_mgr.harvest_outputs(&workspace).await.unwrap_or_default();
            let has_deliverable = !success_requires_any_file || !harvested.files.is_empty();

            if outcome.success && has_deliverable {
                let result = TaskResult {
                    stdout: outcome.output,
                    files: harvested.files,
                    artifacts: harvested.artifacts,
                    metrics: TaskResultMetrics { duration: Some(outcome.duration), exit_code: outcome.exit_code },
                };
                let _ = store.mark_task_completed(task_id, result).await;
                let _ = store.promote_ready_tasks().await;
            } else {
                let kind = classify_failure(&outcome);
                let retrying = store.mark_task_failed(task_id, kind).await.unwrap_or(false);
                if retrying {
                    let backoff = retry_policy.backoff_for(attempts_before, jitter_sample());
                    tokio::time::sleep(backoff).await;
                    let _ = store.promote_ready_tasks().await;
                } else {
                    let _ = store.cancel_dependents_of_failed().await;
                }
            }

            store.decrement_agent_workload(agent_id).await.ok();
        });

        Ok(())
    }

    /// Cancel every non-terminal task and force-kill every running worker
    /// (swarm timeout/external cancel, §4.5 Termination).
    pub async fn cancel_all(&self) -> CoreResult<()> {
        for task in self.store.list_tasks().await {
            if !task.status.is_terminal() {
                self.store.cancel_task(task.id).await?;
            }
        }
        self.store.push_event(Actor::Coordinator, EventKind::SwarmCancelled).await;
        self.supervisor.kill_all(true).await;
        Ok(())
    }
}

/// A jitter sample in `[-1.0, 1.0]` derived from the wall clock, since the
/// dependency stack carries no dedicated RNG crate (`RetryPolicy::backoff_for`
/// takes the sample as a plain argument for exactly this reason — see its
/// doc comment).
fn jitter_sample() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 2_000) as f64 / 1_000.0 - 1.0
}

/// Maps a worker's [`ExitOutcome`] onto the task-attempt error-kind
/// taxonomy (§7).
fn classify_failure(outcome: &ExitOutcome) -> ErrorKind {
    if outcome.timed_out {
        ErrorKind::Timeout
    } else if outcome.signal.is_some() {
        ErrorKind::WorkerKilledBySignal
    } else {
        ErrorKind::WorkerNonzeroExit
    }
}

fn capabilities_as_tools(caps: &BTreeSet<Capability>) -> Vec<String> {
    caps.iter().map(|c| c.as_str().to_string()).collect()
}

/// Build the prompt written into the agent's workspace (§6 worker
/// protocol): task description plus objective context.
fn build_prompt(task: &Task, cmd: &WorkerCommand) -> String {
    format!(
        "Objective: {}\nStrategy: {}\nTask: {}\n\n{}\n",
        cmd.objective, cmd.strategy, task.name, task.description
    )
}

fn build_worker_spec(
    agent_id: &AgentId,
    workspace: &AgentWorkspace,
    prompt: &str,
    allowed_tools: &[String],
    cmd: &WorkerCommand,
    task: &Task,
) -> WorkerSpec {
    let mut env = HashMap::new();
    env.insert("AGENT_ID".to_string(), agent_id.id().to_string());
    env.insert("AGENT_TYPE".to_string(), agent_id.agent_type.as_str().to_string());
    env.insert("AGENT_NAME".to_string(), agent_id.to_string());
    env.insert("WORKING_DIR".to_string(), workspace.dir.display().to_string());
    env.insert("SWARM_ID".to_string(), cmd.swarm_id.to_string());
    env.insert("OBJECTIVE".to_string(), cmd.objective.clone());
    env.insert("STRATEGY".to_string(), cmd.strategy.clone());
    env.insert("TASK_ID".to_string(), task.id.to_string());

    let argv = vec![
        prompt.to_string(),
        "--print".to_string(),
        "--dangerously-skip-permissions".to_string(),
        "--allowed-tools".to_string(),
        allowed_tools.join(","),
    ];

    WorkerSpec::new(cmd.executable.clone(), workspace.dir.clone())
        .with_argv(argv)
        .with_env(env)
        .with_allowed_tools(allowed_tools.to_vec())
        .with_task_timeout(task.timeout)
}
