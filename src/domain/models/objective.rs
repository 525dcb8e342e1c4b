//! Swarm objective — the top-level unit of work the Swarm Coordinator owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::Id;
use super::topology::Strategy;

/// Status of the overall objective/swarm run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    Running,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl ObjectiveStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

/// Timestamps bracketing an objective's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Timeline {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn end(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }
}

/// The top-level objective: immutable except for `status` and
/// `timeline.ended_at`, per §3 ownership rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmObjective {
    pub id: Id,
    /// The workspace/agent-id namespace this objective's run was assigned
    /// (see [`crate::services::workspace_manager::WorkspacePaths`]).
    pub swarm_id: Id,
    pub description: String,
    pub strategy: Strategy,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<Id>,
    pub status: ObjectiveStatus,
    pub timeline: Timeline,
}

impl SwarmObjective {
    pub fn new(swarm_id: Id, description: impl Into<String>, strategy: Strategy, tasks: Vec<Id>) -> Self {
        Self {
            id: Id::new(),
            swarm_id,
            description: description.into(),
            strategy,
            created_at: Utc::now(),
            tasks,
            status: ObjectiveStatus::Running,
            timeline: Timeline::start(),
        }
    }

    pub fn finish(&mut self, status: ObjectiveStatus) {
        debug_assert!(status.is_terminal() || status == ObjectiveStatus::Cancelling);
        self.status = status;
        if status.is_terminal() {
            self.timeline.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_sets_end_timestamp_once() {
        let mut o = SwarmObjective::new(Id::new(), "do things", Strategy::Auto, vec![]);
        assert!(o.timeline.ended_at.is_none());
        o.finish(ObjectiveStatus::Completed);
        let first = o.timeline.ended_at;
        assert!(first.is_some());
        // Calling finish again should not move the end timestamp.
        o.timeline.end();
        assert_eq!(o.timeline.ended_at, first);
    }
}
