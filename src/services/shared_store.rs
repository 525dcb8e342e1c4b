//! Shared Coordination Store (C3): single source of truth for live agent
//! state, task state, resource locks, and cross-agent memory.
//!
//! Grounded on the teacher's explicit-lock-typed repository adapters
//! (favoring a plain `tokio::sync::RwLock`-guarded struct over an actor),
//! with a bounded event log and `tokio::sync::Notify` wake signals
//! replacing the reference implementation's ad-hoc polling (§4.3
//! implementation note).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{
    Actor, Agent, AgentId, CoordinationEvent, EventKind, Holder, LockState, MemoryEntry,
    MemoryFilter, MemoryKey, Task, TaskPriority, TaskStatus,
};

/// Event log cap (§4.3): oldest entries dropped on overflow.
pub const EVENT_LOG_CAP: usize = 10_000;

struct Inner {
    agents: HashMap<Id, Agent>,
    tasks: HashMap<Id, Task>,
    locks: HashMap<String, LockState>,
    memory: HashMap<MemoryKey, MemoryEntry>,
    events: VecDeque<CoordinationEvent>,
}

use crate::domain::models::Id;

/// The append-only coordination log plus every piece of mutable swarm
/// state, guarded by a single `RwLock` per §4.3's "atomic w.r.t. the
/// store" requirement.
pub struct SharedStore {
    inner: RwLock<Inner>,
    /// Woken on `task:completed` / `agent:workload-decreased` — the
    /// scheduler's two suspension points (§5).
    pub wake: Arc<Notify>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                agents: HashMap::new(),
                tasks: HashMap::new(),
                locks: HashMap::new(),
                memory: HashMap::new(),
                events: VecDeque::new(),
            }),
            wake: Arc::new(Notify::new()),
        }
    }
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record_event(&self, inner: &mut Inner, actor: Actor, kind: EventKind) {
        inner.events.push_back(CoordinationEvent::new(actor, kind));
        while inner.events.len() > EVENT_LOG_CAP {
            inner.events.pop_front();
        }
    }

    // ---- Agents -----------------------------------------------------

    pub async fn register_agent(&self, agent: Agent) {
        let mut inner = self.inner.write().await;
        let id = agent.id.id();
        let agent_id = agent.id.clone();
        inner.agents.insert(id, agent);
        self.record_event(&mut inner, Actor::Coordinator, EventKind::AgentRegistered { agent_id: id })
            .await;
        let _ = agent_id;
    }

    pub async fn get_agent(&self, id: Id) -> Option<Agent> {
        self.inner.read().await.agents.get(&id).cloned()
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        self.inner.read().await.agents.values().cloned().collect()
    }

    pub async fn update_agent_status(&self, id: Id, status: crate::domain::models::AgentStatus) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&id)
            .ok_or_else(|| CoreError::AgentNotFound(id.to_string()))?;
        agent.status = status;
        self.record_event(
            &mut inner,
            Actor::Scheduler,
            EventKind::AgentStatusChanged {
                agent_id: id,
                status: status.as_str().to_string(),
            },
        )
        .await;
        Ok(())
    }

    pub async fn increment_agent_workload(&self, id: Id) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&id)
            .ok_or_else(|| CoreError::AgentNotFound(id.to_string()))?;
        agent.increment_workload();
        let workload = agent.workload;
        self.record_event(
            &mut inner,
            Actor::Scheduler,
            EventKind::AgentWorkloadChanged { agent_id: id, workload },
        )
        .await;
        Ok(())
    }

    pub async fn decrement_agent_workload(&self, id: Id) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&id)
            .ok_or_else(|| CoreError::AgentNotFound(id.to_string()))?;
        agent.decrement_workload();
        let workload = agent.workload;
        self.record_event(
            &mut inner,
            Actor::Scheduler,
            EventKind::AgentWorkloadChanged { agent_id: id, workload },
        )
        .await;
        drop(inner);
        self.wake.notify_waiters();
        Ok(())
    }

    pub async fn terminate_agent(&self, id: Id) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&id)
            .ok_or_else(|| CoreError::AgentNotFound(id.to_string()))?;
        agent.terminate();
        self.record_event(&mut inner, Actor::Coordinator, EventKind::AgentTerminated { agent_id: id })
            .await;
        Ok(())
    }

    // ---- Tasks --------------------------------------------------------

    pub async fn add_task(&self, task: Task) {
        let mut inner = self.inner.write().await;
        let id = task.id;
        inner.tasks.insert(id, task);
        self.record_event(&mut inner, Actor::Coordinator, EventKind::TaskAdded { task_id: id })
            .await;
    }

    pub async fn get_task(&self, id: Id) -> Option<Task> {
        self.inner.read().await.tasks.get(&id).cloned()
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        self.inner.read().await.tasks.values().cloned().collect()
    }

    /// Recompute `ready` status for every task whose dependencies are now
    /// satisfied. Called after a task transitions to `completed`.
    pub async fn promote_ready_tasks(&self) -> CoreResult<Vec<Id>> {
        let mut inner = self.inner.write().await;
        let completed: std::collections::BTreeSet<Id> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id)
            .collect();
        let to_promote: Vec<Id> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Created && t.dependencies_satisfied(&completed))
            .map(|t| t.id)
            .collect();
        for id in &to_promote {
            if let Some(task) = inner.tasks.get_mut(id) {
                let _ = task.transition_to(TaskStatus::Ready);
            }
            self.record_event(&mut inner, Actor::Scheduler, EventKind::TaskReady { task_id: *id })
                .await;
        }
        Ok(to_promote)
    }

    /// `getReadyTasks()`: every `ready` task, ordered `(priority desc,
    /// createdAt asc)` per §4.3.
    pub async fn get_ready_tasks(&self) -> Vec<Task> {
        let inner = self.inner.read().await;
        let mut ready: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Ready)
            .cloned()
            .collect();
        ready.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        ready
    }

    pub async fn mark_task_assigned(&self, task_id: Id, agent_id: Id) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id.as_uuid()))?;
        task.transition_to(TaskStatus::Assigned)
            .map_err(|to| CoreError::InvalidTransition {
                from: task.status.as_str().into(),
                to: to.as_str().into(),
            })?;
        task.current_agent = Some(agent_id);
        self.record_event(
            &mut inner,
            Actor::Scheduler,
            EventKind::TaskAssigned { task_id, agent_id },
        )
        .await;
        Ok(())
    }

    /// Push a fresh [`crate::domain::models::Attempt`] onto the task, taken
    /// at the moment the scheduler assigns it to `agent_id`.
    pub async fn start_task_attempt(&self, task_id: Id, agent_id: Id) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id.as_uuid()))?;
        task.attempts.push(crate::domain::models::Attempt::start(agent_id));
        Ok(())
    }

    pub async fn mark_task_running(&self, task_id: Id) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id.as_uuid()))?;
        task.transition_to(TaskStatus::Running)
            .map_err(|to| CoreError::InvalidTransition {
                from: task.status.as_str().into(),
                to: to.as_str().into(),
            })?;
        self.record_event(&mut inner, Actor::Scheduler, EventKind::TaskRunning { task_id })
            .await;
        Ok(())
    }

    pub async fn mark_task_completed(
        &self,
        task_id: Id,
        result: crate::domain::models::TaskResult,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id.as_uuid()))?;
        task.transition_to(TaskStatus::Completed)
            .map_err(|to| CoreError::InvalidTransition {
                from: task.status.as_str().into(),
                to: to.as_str().into(),
            })?;
        if let Some(attempt) = task.last_attempt_mut() {
            attempt.finish_success();
        }
        task.result = Some(result);
        self.record_event(&mut inner, Actor::Scheduler, EventKind::TaskCompleted { task_id })
            .await;
        drop(inner);
        self.wake.notify_waiters();
        Ok(())
    }

    /// Mark a task failed for this attempt. Returns `true` if the task
    /// re-entered `ready` for a retry, `false` if it reached terminal
    /// `failed`.
    pub async fn mark_task_failed(
        &self,
        task_id: Id,
        kind: crate::domain::models::ErrorKind,
    ) -> CoreResult<bool> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id.as_uuid()))?;
        if let Some(attempt) = task.last_attempt_mut() {
            attempt.finish_failure(kind);
        }
        task.transition_to(TaskStatus::Failed)
            .map_err(|to| CoreError::InvalidTransition {
                from: task.status.as_str().into(),
                to: to.as_str().into(),
            })?;
        let retry = !task.is_exhausted() && kind.is_retriable();
        if retry {
            task.transition_to(TaskStatus::Ready).map_err(|to| CoreError::InvalidTransition {
                from: task.status.as_str().into(),
                to: to.as_str().into(),
            })?;
        }
        self.record_event(
            &mut inner,
            Actor::Scheduler,
            EventKind::TaskFailed {
                task_id,
                retriable: retry,
            },
        )
        .await;
        drop(inner);
        self.wake.notify_waiters();
        Ok(retry)
    }

    /// Bump a task's priority one tier, used by the scheduler's
    /// starvation-avoidance rule once a ready task has gone undispatched
    /// for too many loop iterations (§4.5 Fairness).
    pub async fn bump_task_priority(&self, task_id: Id) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id.as_uuid()))?;
        task.priority = task.priority.bump();
        Ok(())
    }

    pub async fn cancel_task(&self, task_id: Id) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id.as_uuid()))?;
        if task.status.is_terminal() {
            return Ok(());
        }
        task.transition_to(TaskStatus::Cancelled)
            .map_err(|to| CoreError::InvalidTransition {
                from: task.status.as_str().into(),
                to: to.as_str().into(),
            })?;
        self.record_event(&mut inner, Actor::Scheduler, EventKind::TaskCancelled { task_id })
            .await;
        Ok(())
    }

    /// Cancel every non-terminal task whose dependencies include a
    /// terminally-failed task (§4.5 step 5, §8 boundary behavior).
    pub async fn cancel_dependents_of_failed(&self) -> CoreResult<Vec<Id>> {
        let mut inner = self.inner.write().await;
        // `mark_task_failed` already resolves the retry decision inline: a
        // task that can still retry is re-transitioned to `Ready` before
        // this ever runs, so `Failed` in the store always means terminal.
        let failed: std::collections::BTreeSet<Id> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.id)
            .collect();
        let to_cancel: Vec<Id> = inner
            .tasks
            .values()
            .filter(|t| {
                !t.status.is_terminal() && t.dependencies.iter().any(|d| failed.contains(d))
            })
            .map(|t| t.id)
            .collect();
        for id in &to_cancel {
            if let Some(task) = inner.tasks.get_mut(id) {
                let _ = task.transition_to(TaskStatus::Cancelled);
            }
            self.record_event(&mut inner, Actor::Scheduler, EventKind::TaskCancelled { task_id: *id })
                .await;
        }
        Ok(to_cancel)
    }

    // ---- Locks ----------------------------------------------------------

    /// `acquireLock(name, holder, mode=try)`. Non-blocking; returns `false`
    /// if the lock is held by someone else (caller enqueues separately for
    /// the blocking variant via [`Self::enqueue_waiter`]).
    pub async fn try_acquire_lock(&self, name: &str, holder: Holder) -> bool {
        let mut inner = self.inner.write().await;
        let acquired = inner.locks.entry(name.to_string()).or_default().try_acquire(holder);
        if acquired {
            self.record_event(
                &mut inner,
                actor_for(holder),
                EventKind::LockAcquired { name: name.to_string() },
            )
            .await;
        }
        acquired
    }

    pub async fn enqueue_waiter(&self, name: &str, holder: Holder) -> usize {
        let mut inner = self.inner.write().await;
        inner.locks.entry(name.to_string()).or_default().enqueue(holder)
    }

    pub async fn release_lock(&self, name: &str, holder: Holder) {
        let mut inner = self.inner.write().await;
        let woken = inner
            .locks
            .get_mut(name)
            .and_then(|lock| lock.release(holder));
        self.record_event(
            &mut inner,
            actor_for(holder),
            EventKind::LockReleased { name: name.to_string() },
        )
        .await;
        if let Some(next) = woken {
            self.record_event(
                &mut inner,
                actor_for(next),
                EventKind::LockAcquired { name: name.to_string() },
            )
            .await;
        }
        drop(inner);
        self.wake.notify_waiters();
    }

    // ---- Memory -----------------------------------------------------------

    /// Writes go through the named lock `memory:<namespace>:<key>` (§4.3,
    /// §8#6) so concurrent writers to the same key produce `LockAcquired` /
    /// `MemoryWrite` / `LockReleased` events in true acquisition order,
    /// rather than relying incidentally on the store's own `RwLock`.
    pub async fn store_memory(&self, entry: MemoryEntry) {
        let mut inner = self.inner.write().await;
        let namespace = entry.namespace.clone();
        let entry_key = entry.key.clone();
        let lock_name = memory_lock_name(&namespace, &entry_key);
        let holder = Holder::Coordinator;

        inner.locks.entry(lock_name.clone()).or_default().try_acquire(holder);
        self.record_event(
            &mut inner,
            Actor::Coordinator,
            EventKind::LockAcquired { name: lock_name.clone() },
        )
        .await;

        let key = (namespace.clone(), entry_key.clone());
        inner.memory.insert(key, entry);
        self.record_event(
            &mut inner,
            Actor::Coordinator,
            EventKind::MemoryWrite {
                namespace,
                key: entry_key,
            },
        )
        .await;

        let woken = inner.locks.get_mut(&lock_name).and_then(|lock| lock.release(holder));
        self.record_event(
            &mut inner,
            Actor::Coordinator,
            EventKind::LockReleased { name: lock_name.clone() },
        )
        .await;
        if let Some(next) = woken {
            self.record_event(&mut inner, actor_for(next), EventKind::LockAcquired { name: lock_name }).await;
        }
        drop(inner);
        self.wake.notify_waiters();
    }

    pub async fn get_memory(&self, namespace: &str, key: &str) -> Option<MemoryEntry> {
        let inner = self.inner.read().await;
        inner
            .memory
            .get(&(namespace.to_string(), key.to_string()))
            .filter(|e| !e.is_expired())
            .cloned()
    }

    pub async fn search_memory(&self, filter: &MemoryFilter) -> Vec<MemoryEntry> {
        self.inner
            .read()
            .await
            .memory
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub async fn delete_memory(&self, namespace: &str, key: &str) {
        self.inner
            .write()
            .await
            .memory
            .remove(&(namespace.to_string(), key.to_string()));
    }

    // ---- Events -----------------------------------------------------------

    pub async fn recent_events(&self, n: usize) -> Vec<CoordinationEvent> {
        let inner = self.inner.read().await;
        inner.events.iter().rev().take(n).rev().cloned().collect()
    }

    pub async fn push_event(&self, actor: Actor, kind: EventKind) {
        let mut inner = self.inner.write().await;
        self.record_event(&mut inner, actor, kind).await;
    }

    /// Total workload across every agent, used by the scheduler's
    /// `maxRunningTasks` backpressure check (§4.5).
    pub async fn total_workload(&self) -> u32 {
        self.inner.read().await.agents.values().map(|a| a.workload).sum()
    }
}

fn actor_for(holder: Holder) -> Actor {
    match holder {
        Holder::Agent(id) => Actor::Agent(id),
        Holder::Coordinator => Actor::Coordinator,
    }
}

fn memory_lock_name(namespace: &str, key: &str) -> String {
    format!("memory:{namespace}:{key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentLimits, AgentType, TaskType};
    use std::path::PathBuf;

    fn test_agent() -> Agent {
        Agent::new(
            AgentId::new(Id::new(), AgentType::Coder, 0),
            "coder-0",
            AgentType::Coder,
            AgentType::Coder.default_capabilities(),
            AgentLimits::default(),
            PathBuf::from("/tmp/ws"),
        )
    }

    #[tokio::test]
    async fn ready_tasks_ordered_by_priority_then_age() {
        let store = SharedStore::new();
        let mut low = Task::new("low", "d", TaskType::Other, TaskPriority::Low);
        low.transition_to(TaskStatus::Ready).unwrap();
        let mut high = Task::new("high", "d", TaskType::Other, TaskPriority::High);
        high.transition_to(TaskStatus::Ready).unwrap();
        store.add_task(low).await;
        store.add_task(high.clone()).await;

        let ready = store.get_ready_tasks().await;
        assert_eq!(ready[0].id, high.id);
    }

    #[tokio::test]
    async fn promote_ready_tasks_unblocks_dependents() {
        let store = SharedStore::new();
        let mut root = Task::new("root", "d", TaskType::Other, TaskPriority::Normal);
        root.transition_to(TaskStatus::Ready).unwrap();
        root.transition_to(TaskStatus::Assigned).unwrap();
        root.transition_to(TaskStatus::Running).unwrap();
        let root_id = root.id;

        let dependent = Task::new("dep", "d", TaskType::Other, TaskPriority::Normal)
            .with_dependencies(vec![root_id]);
        let dep_id = dependent.id;

        store.add_task(root).await;
        store.add_task(dependent).await;

        store.mark_task_completed(root_id, Default::default()).await.unwrap();
        let promoted = store.promote_ready_tasks().await.unwrap();
        assert!(promoted.contains(&dep_id));
        assert_eq!(store.get_task(dep_id).await.unwrap().status, TaskStatus::Ready);
    }

    #[tokio::test]
    async fn failing_task_under_max_attempts_retries_to_ready() {
        let store = SharedStore::new();
        let mut task = Task::new("t", "d", TaskType::Coding, TaskPriority::Normal);
        task.transition_to(TaskStatus::Ready).unwrap();
        task.transition_to(TaskStatus::Assigned).unwrap();
        task.transition_to(TaskStatus::Running).unwrap();
        let id = task.id;
        store.add_task(task).await;

        let retried = store
            .mark_task_failed(id, crate::domain::models::ErrorKind::Timeout)
            .await
            .unwrap();
        assert!(retried);
        assert_eq!(store.get_task(id).await.unwrap().status, TaskStatus::Ready);
    }

    #[tokio::test]
    async fn agent_workload_increment_and_decrement_wakes_store() {
        let store = SharedStore::new();
        let agent = test_agent();
        let id = agent.id.id();
        store.register_agent(agent).await;
        store.update_agent_status(id, crate::domain::models::AgentStatus::Idle).await.unwrap();
        store.increment_agent_workload(id).await.unwrap();
        assert_eq!(store.get_agent(id).await.unwrap().workload, 1);
        store.decrement_agent_workload(id).await.unwrap();
        assert_eq!(store.get_agent(id).await.unwrap().workload, 0);
    }

    #[tokio::test]
    async fn event_log_is_capped() {
        let store = SharedStore::new();
        for _ in 0..(EVENT_LOG_CAP + 10) {
            store.push_event(Actor::Coordinator, EventKind::SwarmCancelled).await;
        }
        let events = store.recent_events(EVENT_LOG_CAP + 100).await;
        assert_eq!(events.len(), EVENT_LOG_CAP);
    }

    #[tokio::test]
    async fn memory_round_trips_and_respects_expiry() {
        let store = SharedStore::new();
        let entry = MemoryEntry::new("ns", "k", serde_json::json!(42), crate::domain::models::MemoryOwner::System);
        store.store_memory(entry).await;
        let fetched = store.get_memory("ns", "k").await.unwrap();
        assert_eq!(fetched.value, serde_json::json!(42));
    }

    #[tokio::test]
    async fn lock_try_acquire_and_release_round_trip() {
        let store = SharedStore::new();
        let a = Holder::Agent(Id::new());
        assert!(store.try_acquire_lock("memory:ns:k", a).await);
        store.release_lock("memory:ns:k", a).await;
        assert!(store.try_acquire_lock("memory:ns:k", a).await);
    }

    #[tokio::test]
    async fn store_memory_records_acquire_write_release_in_order() {
        let store = SharedStore::new();
        let entry = MemoryEntry::new("ns", "k", serde_json::json!(1), crate::domain::models::MemoryOwner::System);
        store.store_memory(entry).await;

        let events = store.recent_events(10).await;
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match &e.kind {
                EventKind::LockAcquired { .. } => "acquired",
                EventKind::MemoryWrite { .. } => "write",
                EventKind::LockReleased { .. } => "released",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["acquired", "write", "released"]);

        // The lock is fully released after the write, so a distinct holder
        // can immediately take it for a subsequent write to the same key.
        assert!(store.try_acquire_lock("memory:ns:k", Holder::Agent(Id::new())).await);
    }
}
