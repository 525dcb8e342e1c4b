//! Agent domain model.
//!
//! An agent is a logical worker with a type and capability set, realized at
//! run time by a supervised LLM-CLI subprocess (see [`crate::services::supervisor`]).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use super::ids::{AgentId, Id};

/// Closed enumeration of agent types the decomposer may assign work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Coordinator,
    Researcher,
    Coder,
    Architect,
    Tester,
    Analyst,
    Reviewer,
    Optimizer,
    Documenter,
    Monitor,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Researcher => "researcher",
            Self::Coder => "coder",
            Self::Architect => "architect",
            Self::Tester => "tester",
            Self::Analyst => "analyst",
            Self::Reviewer => "reviewer",
            Self::Optimizer => "optimizer",
            Self::Documenter => "documenter",
            Self::Monitor => "monitor",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "coordinator" => Some(Self::Coordinator),
            "researcher" => Some(Self::Researcher),
            "coder" => Some(Self::Coder),
            "architect" => Some(Self::Architect),
            "tester" => Some(Self::Tester),
            "analyst" => Some(Self::Analyst),
            "reviewer" => Some(Self::Reviewer),
            "optimizer" => Some(Self::Optimizer),
            "documenter" => Some(Self::Documenter),
            "monitor" => Some(Self::Monitor),
            _ => None,
        }
    }

    /// Capabilities an agent of this type carries by default when the
    /// decomposer builds a team without an explicit override.
    pub fn default_capabilities(&self) -> BTreeSet<Capability> {
        match self {
            Self::Coordinator => [Capability::Coordination].into_iter().collect(),
            Self::Researcher => [Capability::Research].into_iter().collect(),
            Self::Coder => [Capability::CodeGeneration].into_iter().collect(),
            Self::Architect => [Capability::Architecture, Capability::CodeGeneration]
                .into_iter()
                .collect(),
            Self::Tester => [Capability::Testing].into_iter().collect(),
            Self::Analyst => [Capability::Analysis, Capability::Research]
                .into_iter()
                .collect(),
            Self::Reviewer => [Capability::Review].into_iter().collect(),
            Self::Optimizer => [Capability::Optimization, Capability::CodeGeneration]
                .into_iter()
                .collect(),
            Self::Documenter => [Capability::Documentation].into_iter().collect(),
            Self::Monitor => [Capability::Monitoring].into_iter().collect(),
        }
    }
}

/// Closed tag set for agent/task capability matching (REDESIGN FLAGS §9:
/// closed variants instead of dynamic unchecked strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    CodeGeneration,
    Research,
    Testing,
    Documentation,
    Analysis,
    Review,
    Architecture,
    Optimization,
    Coordination,
    Monitoring,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code-generation",
            Self::Research => "research",
            Self::Testing => "testing",
            Self::Documentation => "documentation",
            Self::Analysis => "analysis",
            Self::Review => "review",
            Self::Architecture => "architecture",
            Self::Optimization => "optimization",
            Self::Coordination => "coordination",
            Self::Monitoring => "monitoring",
        }
    }
}

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Idle,
    Busy,
    Offline,
    Error,
    Terminated,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Offline => "offline",
            Self::Error => "error",
            Self::Terminated => "terminated",
        }
    }

    /// A terminated agent is never reassigned work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Per-agent execution limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentLimits {
    pub max_concurrent_tasks: u32,
    #[serde(with = "duration_secs")]
    pub timeout_per_task: StdDuration,
    pub memory_cap_mb: Option<u64>,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 3,
            timeout_per_task: StdDuration::from_secs(300),
            memory_cap_mb: None,
        }
    }
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Rolling execution metrics for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    #[serde(with = "duration_secs")]
    pub avg_execution_time: StdDuration,
    #[serde(with = "duration_secs")]
    pub last_execution_time: StdDuration,
    pub last_activity: DateTime<Utc>,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            tasks_failed: 0,
            avg_execution_time: StdDuration::ZERO,
            last_execution_time: StdDuration::ZERO,
            last_activity: Utc::now(),
        }
    }
}

impl AgentMetrics {
    /// Fold in the outcome of one more completed attempt into the rolling average.
    pub fn record(&mut self, succeeded: bool, execution_time: StdDuration) {
        if succeeded {
            let n = self.tasks_completed as f64;
            let new_avg = (self.avg_execution_time.as_secs_f64() * n
                + execution_time.as_secs_f64())
                / (n + 1.0);
            self.avg_execution_time = StdDuration::from_secs_f64(new_avg.max(0.0));
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        self.last_execution_time = execution_time;
        self.last_activity = Utc::now();
    }
}

/// A single agent record tracked by the Shared Coordination Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub agent_type: AgentType,
    pub capabilities: BTreeSet<Capability>,
    pub status: AgentStatus,
    pub workload: u32,
    pub limits: AgentLimits,
    pub workspace_dir: PathBuf,
    pub process_handle: Option<Id>,
    pub metrics: AgentMetrics,
    /// Declared layer for hierarchical placement (§4.5): a task may only be
    /// placed on an agent whose layer is ≤ the task's own layer. 0 is the
    /// topmost (coordinator) layer.
    pub layer: u32,
}

impl Agent {
    /// Create a new agent in the `Starting` state with zero workload.
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        agent_type: AgentType,
        capabilities: BTreeSet<Capability>,
        limits: AgentLimits,
        workspace_dir: PathBuf,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            agent_type,
            capabilities,
            status: AgentStatus::Starting,
            workload: 0,
            limits,
            workspace_dir,
            process_handle: None,
            metrics: AgentMetrics::default(),
            layer: 0,
        }
    }

    /// Set the hierarchical placement layer (default 0).
    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    /// True iff every required capability is present and, when a preferred
    /// type is set, it matches this agent's type.
    pub fn satisfies(
        &self,
        required: &BTreeSet<Capability>,
        preferred_type: Option<AgentType>,
    ) -> bool {
        if let Some(t) = preferred_type {
            if t != self.agent_type {
                return false;
            }
        }
        required.is_subset(&self.capabilities)
    }

    /// True iff the agent has spare capacity and is not terminated/offline/error.
    pub fn is_available(&self) -> bool {
        matches!(self.status, AgentStatus::Idle | AgentStatus::Busy)
            && self.workload < self.limits.max_concurrent_tasks
    }

    /// Assign one more unit of work; transitions to `Busy`.
    ///
    /// # Panics
    /// Panics if the agent is at or over its concurrency cap — this is an
    /// invariant violation, not a recoverable condition (the Scheduler must
    /// never call this on a saturated agent).
    pub fn increment_workload(&mut self) {
        assert!(
            self.workload < self.limits.max_concurrent_tasks,
            "workload would exceed max_concurrent_tasks"
        );
        self.workload += 1;
        self.status = AgentStatus::Busy;
    }

    /// Release one unit of work; transitions back to `Idle` at zero.
    ///
    /// # Panics
    /// Panics on underflow — decrementing an agent already at zero workload
    /// is a scheduler bug, per §4.3.
    pub fn decrement_workload(&mut self) {
        assert!(self.workload > 0, "workload underflow");
        self.workload -= 1;
        if self.workload == 0 && !self.status.is_terminal() {
            self.status = AgentStatus::Idle;
        }
    }

    /// Mark this agent as permanently terminated; it is removed from
    /// consideration by every placement policy from this point on.
    pub fn terminate(&mut self) {
        self.status = AgentStatus::Terminated;
        self.process_handle = None;
    }

    /// Seconds since the agent's last recorded activity.
    pub fn idle_for(&self) -> Duration {
        Utc::now() - self.metrics.last_activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn workload_and_status_are_coupled() {
        let mut a = test_agent();
        a.status = AgentStatus::Idle;
        assert_eq!(a.workload, 0);
        a.increment_workload();
        assert_eq!(a.status, AgentStatus::Busy);
        a.decrement_workload();
        assert_eq!(a.status, AgentStatus::Idle);
    }

    #[test]
    #[should_panic(expected = "workload underflow")]
    fn decrement_below_zero_panics() {
        let mut a = test_agent();
        a.decrement_workload();
    }

    #[test]
    #[should_panic(expected = "exceed max_concurrent_tasks")]
    fn increment_past_cap_panics() {
        let mut a = test_agent();
        a.limits.max_concurrent_tasks = 1;
        a.status = AgentStatus::Idle;
        a.increment_workload();
        a.increment_workload();
    }

    #[test]
    fn terminated_agent_is_never_available() {
        let mut a = test_agent();
        a.status = AgentStatus::Idle;
        a.terminate();
        assert!(!a.is_available());
        assert!(a.status.is_terminal());
    }

    #[test]
    fn capability_matching_respects_preferred_type() {
        let a = test_agent();
        let req: BTreeSet<Capability> = [Capability::CodeGeneration].into_iter().collect();
        assert!(a.satisfies(&req, None));
        assert!(a.satisfies(&req, Some(AgentType::Coder)));
        assert!(!a.satisfies(&req, Some(AgentType::Tester)));
    }

    #[test]
    fn capability_matching_requires_full_subset() {
        let a = test_agent();
        let req: BTreeSet<Capability> = [Capability::CodeGeneration, Capability::Research]
            .into_iter()
            .collect();
        assert!(!a.satisfies(&req, None));
    }
}
