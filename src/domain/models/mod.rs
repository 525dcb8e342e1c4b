//! Domain models for the swarm core.

pub mod agent;
pub mod config;
pub mod events;
pub mod ids;
pub mod lock;
pub mod memory;
pub mod objective;
pub mod task;
pub mod topology;

pub use agent::{Agent, AgentLimits, AgentMetrics, AgentStatus, AgentType, Capability};
pub use config::{RetentionPolicy, RetryPolicy, SwarmOptions};
pub use events::{Actor, CoordinationEvent, EventKind};
pub use ids::{AgentId, Id};
pub use lock::{Holder, LockState};
pub use memory::{MemoryEntry, MemoryFilter, MemoryKey, MemoryOwner};
pub use objective::{ObjectiveStatus, SwarmObjective, Timeline};
pub use task::{
    Attempt, AttemptOutcome, ErrorKind, Task, TaskPriority, TaskRequirements, TaskResult,
    TaskResultMetrics, TaskStatus, TaskType,
};
pub use topology::{Strategy, Topology};
