//! Task domain model.
//!
//! Tasks are discrete units of work dispatched to agents. They form a DAG
//! via `dependencies` and progress through the state machine in §4.5 of the
//! specification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::agent::{AgentType, Capability};
use super::ids::{AgentId, Id};

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Coding,
    Research,
    Testing,
    Documentation,
    Analysis,
    Other,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coding => "coding",
            Self::Research => "research",
            Self::Testing => "testing",
            Self::Documentation => "documentation",
            Self::Analysis => "analysis",
            Self::Other => "other",
        }
    }

    /// The capability set implied by this task type, used by the decomposer
    /// to populate `requirements.capabilities` when not given explicitly.
    pub fn implied_capabilities(&self) -> BTreeSet<Capability> {
        match self {
            Self::Coding => [Capability::CodeGeneration].into_iter().collect(),
            Self::Research => [Capability::Research].into_iter().collect(),
            Self::Testing => [Capability::Testing].into_iter().collect(),
            Self::Documentation => [Capability::Documentation].into_iter().collect(),
            Self::Analysis => [Capability::Analysis].into_iter().collect(),
            Self::Other => BTreeSet::new(),
        }
    }

    /// Whether task success additionally requires at least one harvested
    /// file, beyond a zero exit code (§8 boundary case: "a worker that never
    /// emits output but exits 0 still yields success=false" for deliverable
    /// -bearing types — coding, research, documentation).
    pub fn success_requires_any_file(&self) -> bool {
        matches!(self, Self::Coding | Self::Research | Self::Documentation)
    }
}

/// Priority tier. Ordered so `Critical > High > Normal > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Bump to the next tier up, saturating at `Critical` — used by the
    /// scheduler's starvation-avoidance rule (§4.5 Fairness).
    pub fn bump(self) -> Self {
        match self {
            Self::Low => Self::Normal,
            Self::Normal => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }
}

/// Status of a task in the execution pipeline (§4.5 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Ready,
    Assigned,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Ready => "ready",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions, per §4.5. `Failed -> Ready` models a retry;
    /// `Failed` reached with `attempts == max_attempts` (or a fatal error
    /// kind) is absorbing and has no outgoing transitions left to take.
    /// `Ready -> Failed` covers the capability-unmet case: the scheduler can
    /// determine no agent will ever satisfy a task's requirements without
    /// ever assigning it.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Created => &[Self::Ready, Self::Cancelled],
            Self::Ready => &[Self::Assigned, Self::Failed, Self::Cancelled],
            Self::Assigned => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed => &[],
            Self::Failed => &[Self::Ready],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Capability + preferred-agent-type requirements a task places on its executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequirements {
    pub capabilities: BTreeSet<Capability>,
    pub preferred_type: Option<AgentType>,
    /// Hierarchical placement layer assigned by the decomposer (§4.5).
    pub layer: u32,
}

/// Classification of why an attempt ended in failure (mirrors §7's error
/// kind taxonomy, restricted to the kinds that can end a single attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    SpawnFailed,
    WorkerNonzeroExit,
    WorkerKilledBySignal,
    Timeout,
    IoError,
    InvalidTransition,
    CapabilityUnmet,
    DependencyFailed,
    Cancelled,
}

impl ErrorKind {
    /// Retriable per §7 propagation policy.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::WorkerNonzeroExit | Self::WorkerKilledBySignal | Self::Timeout | Self::IoError
        )
    }
}

/// Record of one execution attempt for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub agent_id: Id,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<AttemptOutcome>,
    pub error_kind: Option<ErrorKind>,
}

impl Attempt {
    pub fn start(agent_id: Id) -> Self {
        Self {
            agent_id,
            started_at: Utc::now(),
            ended_at: None,
            outcome: None,
            error_kind: None,
        }
    }

    pub fn finish_success(&mut self) {
        self.ended_at = Some(Utc::now());
        self.outcome = Some(AttemptOutcome::Success);
    }

    pub fn finish_failure(&mut self, kind: ErrorKind) {
        self.ended_at = Some(Utc::now());
        self.outcome = Some(AttemptOutcome::Failure);
        self.error_kind = Some(kind);
    }

    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|end| {
            (end - self.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// Result recorded on successful completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    pub stdout: String,
    /// Harvested small files (under the Workspace Manager's size cap), keyed
    /// by path relative to the agent's output directory.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Every regular file discovered under the workspace, including ones
    /// referenced by path+size only because they exceeded the cap.
    pub artifacts: Vec<String>,
    pub metrics: TaskResultMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResultMetrics {
    pub duration: Option<Duration>,
    pub exit_code: Option<i32>,
}

/// A node in the objective's task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub requirements: TaskRequirements,
    pub dependencies: Vec<Id>,
    pub status: TaskStatus,
    pub attempts: Vec<Attempt>,
    pub deadline: Option<DateTime<Utc>>,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub current_agent: Option<Id>,
}

impl Task {
    /// Build a new task in the `Created` state.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        task_type: TaskType,
        priority: TaskPriority,
    ) -> Self {
        let mut requirements = TaskRequirements::default();
        requirements.capabilities = task_type.implied_capabilities();
        Self {
            id: Id::new(),
            name: name.into(),
            description: description.into(),
            task_type,
            priority,
            requirements,
            dependencies: Vec::new(),
            status: TaskStatus::Created,
            attempts: Vec::new(),
            deadline: None,
            max_attempts: 3,
            timeout: Duration::from_secs(300),
            result: None,
            created_at: Utc::now(),
            current_agent: None,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<Id>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_preferred_type(mut self, t: AgentType) -> Self {
        self.requirements.preferred_type = Some(t);
        self
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.requirements.layer = layer;
        self
    }

    /// Attempt a status transition, validated against the state machine.
    /// Returns the rejected target on `Err` (§7: `invalid-transition`,
    /// a programming error, not a retriable condition).
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), TaskStatus> {
        if self.status.can_transition_to(new_status) {
            self.status = new_status;
            Ok(())
        } else {
            Err(new_status)
        }
    }

    /// Whether every dependency in `completed` means this task is unblocked.
    pub fn dependencies_satisfied(&self, completed: &BTreeSet<Id>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn last_attempt_mut(&mut self) -> Option<&mut Attempt> {
        self.attempts.last_mut()
    }

    /// True once attempts are exhausted or the last error kind is fatal.
    pub fn is_exhausted(&self) -> bool {
        if self.attempts.len() as u32 >= self.max_attempts {
            return true;
        }
        self.last_attempt()
            .and_then(|a| a.error_kind)
            .is_some_and(|k| !k.is_retriable())
    }
}
