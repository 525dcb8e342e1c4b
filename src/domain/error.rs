//! Core error taxonomy (§7).
//!
//! Each kind is a `thiserror` variant; `is_retriable` mirrors the
//! `TaskError::is_permanent`/`is_transient` pattern used throughout the
//! teacher codebase for classifying failures without exceptions-as-control-flow.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the swarm core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("worker exited with nonzero status: {0}")]
    WorkerNonzeroExit(i32),

    #[error("worker was killed by signal {0}")]
    WorkerKilledBySignal(i32),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("workspace I/O error: {0}")]
    IoError(String),

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("no agent satisfies the capability requirements for task {0}")]
    CapabilityUnmet(Uuid),

    #[error("dependency task {0} reached terminal failure")]
    DependencyFailed(Uuid),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::infrastructure::config::ConfigError),
}

impl CoreError {
    /// Per §7 propagation policy: which kinds the Scheduler should retry vs.
    /// treat as a permanent failure on the current attempt.
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::WorkerNonzeroExit(_) | Self::WorkerKilledBySignal(_) | Self::Timeout(_) | Self::IoError(_)
        )
    }

    /// Maps onto the task-attempt error-kind taxonomy used by `Task`.
    pub fn to_task_error_kind(&self) -> crate::domain::models::ErrorKind {
        use crate::domain::models::ErrorKind as K;
        match self {
            Self::InvalidInput(_) => K::InvalidInput,
            Self::SpawnFailed(_) => K::SpawnFailed,
            Self::WorkerNonzeroExit(_) => K::WorkerNonzeroExit,
            Self::WorkerKilledBySignal(_) => K::WorkerKilledBySignal,
            Self::Timeout(_) => K::Timeout,
            Self::IoError(_) => K::IoError,
            Self::InvalidTransition { .. } => K::InvalidTransition,
            Self::CapabilityUnmet(_) => K::CapabilityUnmet,
            Self::DependencyFailed(_) => K::DependencyFailed,
            Self::Cancelled => K::Cancelled,
            Self::TaskNotFound(_) | Self::AgentNotFound(_) | Self::Config(_) => K::InvalidInput,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_kinds_match_spec_table() {
        assert!(CoreError::WorkerNonzeroExit(1).is_retriable());
        assert!(CoreError::WorkerKilledBySignal(9).is_retriable());
        assert!(CoreError::Timeout(std::time::Duration::from_secs(1)).is_retriable());
        assert!(CoreError::IoError("x".into()).is_retriable());
    }

    #[test]
    fn non_retriable_kinds_match_spec_table() {
        assert!(!CoreError::InvalidInput("x".into()).is_retriable());
        assert!(!CoreError::CapabilityUnmet(Uuid::new_v4()).is_retriable());
        assert!(!CoreError::DependencyFailed(Uuid::new_v4()).is_retriable());
        assert!(!CoreError::Cancelled.is_retriable());
        assert!(!CoreError::InvalidTransition {
            from: "a".into(),
            to: "b".into()
        }
        .is_retriable());
    }
}
