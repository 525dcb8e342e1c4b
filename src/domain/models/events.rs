//! Coordination events — a closed, typed event taxonomy (REDESIGN FLAGS §9)
//! replacing an "everything emits" ad-hoc EventEmitter pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::Id;

/// Actor that produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Agent(Id),
    Scheduler,
    Coordinator,
    Supervisor,
}

/// The closed set of coordination events recorded in the Shared Store's
/// event log and used to wake suspended scheduler loops (§5 suspension points).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    AgentRegistered { agent_id: Id },
    AgentStatusChanged { agent_id: Id, status: String },
    AgentWorkloadChanged { agent_id: Id, workload: u32 },
    AgentTerminated { agent_id: Id },
    TaskAdded { task_id: Id },
    TaskReady { task_id: Id },
    TaskAssigned { task_id: Id, agent_id: Id },
    TaskRunning { task_id: Id },
    TaskCompleted { task_id: Id },
    TaskFailed { task_id: Id, retriable: bool },
    TaskCancelled { task_id: Id },
    LockAcquired { name: String },
    LockReleased { name: String },
    MemoryWrite { namespace: String, key: String },
    WorkerSpawned { worker_id: Id, task_id: Id },
    WorkerExited { worker_id: Id, success: bool },
    WorkerTimedOut { worker_id: Id },
    SwarmTimedOut,
    SwarmCancelled,
}

/// A single append-only log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationEvent {
    pub ts: DateTime<Utc>,
    pub actor: Actor,
    pub kind: EventKind,
}

impl CoordinationEvent {
    pub fn new(actor: Actor, kind: EventKind) -> Self {
        Self {
            ts: Utc::now(),
            actor,
            kind,
        }
    }
}
