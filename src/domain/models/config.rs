//! Run-time options for a single `runObjective` call (§4.6).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::topology::Topology;

/// What to do with an agent's workspace directory after the swarm ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    #[default]
    Keep,
    Archive,
    Delete,
}

impl RetentionPolicy {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keep" => Some(Self::Keep),
            "archive" => Some(Self::Archive),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Exponential backoff parameters for task retries (§4.5 main loop step 5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 2_000,
            backoff_cap_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff with `+/-20%` jitter, capped, for the `attempt`th
    /// retry (0-indexed). Deterministic given `jitter_sample` in `[-1.0, 1.0]`
    /// so callers (and tests) can supply their own randomness source.
    pub fn backoff_for(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let jitter_sample = jitter_sample.clamp(-1.0, 1.0);
        let base = self.backoff_base_ms as f64 * 2f64.powi(attempt as i32);
        let capped = base.min(self.backoff_cap_ms as f64);
        let jittered = capped * (1.0 + 0.2 * jitter_sample);
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Options recognized by `runObjective` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmOptions {
    pub max_agents: usize,
    pub max_concurrent_tasks_per_agent: u32,
    #[serde(with = "super::agent::duration_secs")]
    pub task_timeout: Duration,
    #[serde(with = "super::agent::duration_secs")]
    pub swarm_timeout: Duration,
    pub topology: Topology,
    pub workspace_root: PathBuf,
    pub retain_workspaces: RetentionPolicy,
    pub retry_policy: RetryPolicy,
}

impl Default for SwarmOptions {
    fn default() -> Self {
        Self {
            max_agents: 5,
            max_concurrent_tasks_per_agent: 3,
            task_timeout: Duration::from_secs(300),
            swarm_timeout: Duration::from_secs(30 * 60),
            topology: Topology::default(),
            workspace_root: PathBuf::from("./swarm-workspaces"),
            retain_workspaces: RetentionPolicy::default(),
            retry_policy: RetryPolicy::default(),
        }
    }
}
