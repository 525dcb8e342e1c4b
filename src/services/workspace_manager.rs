//! Workspace Manager (C1): deterministic per-swarm / per-agent filesystem
//! layout, prompt materialization, and output harvesting.
//!
//! Grounded on the teacher's pattern of isolating blocking filesystem calls
//! behind `tokio::task::spawn_blocking`, and its temp-file-then-`rename`
//! atomic write idiom from the config/adapter layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::{AgentId, Id, RetentionPolicy};

/// Default cap on a single harvested file (§4.1).
pub const DEFAULT_HARVEST_CAP_BYTES: u64 = 1024 * 1024;

/// Directory layout rooted at `<root>/swarm-<swarmId>/` (§3 Workspace).
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub shared_memory_file: PathBuf,
    pub communication_dir: PathBuf,
    pub agents_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl WorkspacePaths {
    fn for_swarm(workspace_root: &Path, swarm_id: Id) -> Self {
        let root = workspace_root.join(format!("swarm-{}", swarm_id));
        Self {
            shared_memory_file: root.join("shared-memory.json"),
            communication_dir: root.join("communication"),
            agents_dir: root.join("agents"),
            output_dir: root.join("output"),
            root,
        }
    }
}

/// Per-agent working directory and its well-known files.
#[derive(Debug, Clone)]
pub struct AgentWorkspace {
    pub dir: PathBuf,
    pub prompt_path: PathBuf,
    pub info_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct WorkspaceInfo {
    swarm_id: Id,
    agent_id: String,
    created_at: DateTime<Utc>,
    task_type: Option<String>,
}

/// Harvested output of a completed task (§4.1 `harvestOutputs`).
#[derive(Debug, Clone, Default)]
pub struct HarvestResult {
    pub files: BTreeMap<String, Vec<u8>>,
    pub artifacts: Vec<String>,
}

pub struct WorkspaceManager {
    workspace_root: PathBuf,
    harvest_cap_bytes: u64,
}

impl WorkspaceManager {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            harvest_cap_bytes: DEFAULT_HARVEST_CAP_BYTES,
        }
    }

    pub fn with_harvest_cap_bytes(mut self, cap: u64) -> Self {
        self.harvest_cap_bytes = cap;
        self
    }

    /// `createSwarmWorkspace(swarmId) → WorkspacePaths`. Idempotent.
    pub async fn create_swarm_workspace(&self, swarm_id: Id) -> CoreResult<WorkspacePaths> {
        let paths = WorkspacePaths::for_swarm(&self.workspace_root, swarm_id);
        let dirs = vec![
            paths.root.clone(),
            paths.communication_dir.clone(),
            paths.agents_dir.clone(),
            paths.output_dir.clone(),
        ];
        tokio::task::spawn_blocking(move || {
            for dir in dirs {
                std::fs::create_dir_all(&dir)
                    .map_err(|e| CoreError::IoError(format!("{}: {e}", dir.display())))?;
            }
            Ok::<_, CoreError>(())
        })
        .await
        .map_err(|e| CoreError::IoError(e.to_string()))??;
        Ok(paths)
    }

    /// `createAgentWorkspace(swarmId, agentId) → AgentWorkspace`.
    pub async fn create_agent_workspace(
        &self,
        paths: &WorkspacePaths,
        agent_id: &AgentId,
        task_type: Option<String>,
    ) -> CoreResult<AgentWorkspace> {
        let dir = paths.agents_dir.join(agent_id.id().to_string());
        let info = WorkspaceInfo {
            swarm_id: agent_id.swarm,
            agent_id: agent_id.to_string(),
            created_at: Utc::now(),
            task_type,
        };
        let info_path = dir.join("workspace-info.json");
        let prompt_path = dir.join("enhanced-prompt.md");
        let dir_clone = dir.clone();
        let info_path_clone = info_path.clone();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir_clone)
                .map_err(|e| CoreError::IoError(format!("{}: {e}", dir_clone.display())))?;
            let json = serde_json::to_vec_pretty(&info).map_err(|e| CoreError::IoError(e.to_string()))?;
            atomic_write(&info_path_clone, &json)
        })
        .await
        .map_err(|e| CoreError::IoError(e.to_string()))??;

        Ok(AgentWorkspace {
            dir,
            prompt_path,
            info_path,
        })
    }

    /// `writePrompt(agentWorkspace, promptContent) → promptPath`.
    pub async fn write_prompt(&self, workspace: &AgentWorkspace, content: String) -> CoreResult<PathBuf> {
        let path = workspace.prompt_path.clone();
        let path_clone = path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path_clone, content.as_bytes()))
            .await
            .map_err(|e| CoreError::IoError(e.to_string()))??;
        Ok(path)
    }

    /// `harvestOutputs(agentWorkspace) → {files, artifactList}`. Per-file
    /// read errors are logged and skipped — a single unreadable artifact
    /// never fails the task (§4.1 failure semantics).
    ///
    /// Scans the agent's working directory but excludes the files the
    /// coordinator itself writes before the worker ever runs
    /// (`enhanced-prompt.md`, `workspace-info.json`) — those aren't
    /// deliverables and must not satisfy the §8 deliverable-presence check.
    pub async fn harvest_outputs(&self, workspace: &AgentWorkspace) -> CoreResult<HarvestResult> {
        let dir = workspace.dir.clone();
        let cap = self.harvest_cap_bytes;
        let excluded = coordinator_written_names(workspace);
        tokio::task::spawn_blocking(move || Ok(harvest_dir_blocking(&dir, cap, &excluded)))
            .await
            .map_err(|e| CoreError::IoError(e.to_string()))?
    }

    /// `teardownAgentWorkspace(agentWorkspace, policy)`.
    pub async fn teardown_agent_workspace(
        &self,
        workspace: &AgentWorkspace,
        policy: RetentionPolicy,
    ) -> CoreResult<()> {
        let dir = workspace.dir.clone();
        tokio::task::spawn_blocking(move || match policy {
            RetentionPolicy::Keep => Ok(()),
            RetentionPolicy::Delete => std::fs::remove_dir_all(&dir)
                .or_else(|e| if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) })
                .map_err(|e| CoreError::IoError(e.to_string())),
            RetentionPolicy::Archive => {
                let archived = dir.with_extension("archived");
                std::fs::rename(&dir, archived).map_err(|e| CoreError::IoError(e.to_string()))
            }
        })
        .await
        .map_err(|e| CoreError::IoError(e.to_string()))?
    }
}

/// Relative (to the agent workspace root) filenames the coordinator writes
/// before the worker runs — never deliverables, always excluded from harvest.
fn coordinator_written_names(workspace: &AgentWorkspace) -> std::collections::BTreeSet<String> {
    [&workspace.prompt_path, &workspace.info_path]
        .into_iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

fn harvest_dir_blocking(dir: &Path, cap: u64, excluded: &std::collections::BTreeSet<String>) -> HarvestResult {
    let mut result = HarvestResult::default();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %current.display(), error = %e, "failed to read directory during harvest");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            let rel = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            if current == *dir && excluded.contains(&rel) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to stat harvested file");
                    result.artifacts.push(rel);
                    continue;
                }
            };
            result.artifacts.push(rel.clone());
            if metadata.len() > cap {
                continue;
            }
            match std::fs::read(&path) {
                Ok(bytes) => {
                    result.files.insert(rel, bytes);
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to read harvested file");
                }
            }
        }
    }
    result
}

pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CoreError::IoError(e.to_string()))?;
    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp, bytes).map_err(|e| CoreError::IoError(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| CoreError::IoError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentType;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_swarm_workspace_is_idempotent() {
        let dir = tempdir().unwrap();
        let mgr = WorkspaceManager::new(dir.path());
        let swarm_id = Id::new();
        let first = mgr.create_swarm_workspace(swarm_id).await.unwrap();
        let second = mgr.create_swarm_workspace(swarm_id).await.unwrap();
        assert_eq!(first.root, second.root);
        assert!(first.agents_dir.exists());
        assert!(first.output_dir.exists());
    }

    #[tokio::test]
    async fn write_prompt_then_harvest_roundtrip() {
        let dir = tempdir().unwrap();
        let mgr = WorkspaceManager::new(dir.path());
        let swarm_id = Id::new();
        let paths = mgr.create_swarm_workspace(swarm_id).await.unwrap();
        let agent_id = AgentId::new(swarm_id, AgentType::Coder, 0);
        let ws = mgr
            .create_agent_workspace(&paths, &agent_id, Some("coding".into()))
            .await
            .unwrap();
        mgr.write_prompt(&ws, "do the thing".into()).await.unwrap();

        std::fs::write(ws.dir.join("output.py"), b"print('hi')").unwrap();

        let harvested = mgr.harvest_outputs(&ws).await.unwrap();
        assert!(harvested.files.contains_key("output.py"));
        assert!(!harvested.artifacts.contains(&"enhanced-prompt.md".to_string()));
        assert!(!harvested.artifacts.contains(&"workspace-info.json".to_string()));
    }

    #[tokio::test]
    async fn harvest_of_untouched_workspace_yields_no_deliverables() {
        let dir = tempdir().unwrap();
        let mgr = WorkspaceManager::new(dir.path());
        let swarm_id = Id::new();
        let paths = mgr.create_swarm_workspace(swarm_id).await.unwrap();
        let agent_id = AgentId::new(swarm_id, AgentType::Coder, 0);
        let ws = mgr
            .create_agent_workspace(&paths, &agent_id, Some("coding".into()))
            .await
            .unwrap();
        mgr.write_prompt(&ws, "do the thing".into()).await.unwrap();

        let harvested = mgr.harvest_outputs(&ws).await.unwrap();
        assert!(harvested.files.is_empty());
        assert!(harvested.artifacts.is_empty());
    }

    #[tokio::test]
    async fn harvest_skips_files_over_cap_but_lists_them() {
        let dir = tempdir().unwrap();
        let mgr = WorkspaceManager::new(dir.path()).with_harvest_cap_bytes(4);
        let swarm_id = Id::new();
        let paths = mgr.create_swarm_workspace(swarm_id).await.unwrap();
        let agent_id = AgentId::new(swarm_id, AgentType::Coder, 0);
        let ws = mgr
            .create_agent_workspace(&paths, &agent_id, None)
            .await
            .unwrap();
        std::fs::write(ws.dir.join("big.txt"), b"this is too large").unwrap();

        let harvested = mgr.harvest_outputs(&ws).await.unwrap();
        assert!(!harvested.files.contains_key("big.txt"));
        assert!(harvested.artifacts.contains(&"big.txt".to_string()));
    }

    #[tokio::test]
    async fn teardown_delete_removes_directory() {
        let dir = tempdir().unwrap();
        let mgr = WorkspaceManager::new(dir.path());
        let swarm_id = Id::new();
        let paths = mgr.create_swarm_workspace(swarm_id).await.unwrap();
        let agent_id = AgentId::new(swarm_id, AgentType::Coder, 0);
        let ws = mgr
            .create_agent_workspace(&paths, &agent_id, None)
            .await
            .unwrap();
        mgr.teardown_agent_workspace(&ws, RetentionPolicy::Delete)
            .await
            .unwrap();
        assert!(!ws.dir.exists());
    }

    #[tokio::test]
    async fn teardown_keep_leaves_directory_untouched() {
        let dir = tempdir().unwrap();
        let mgr = WorkspaceManager::new(dir.path());
        let swarm_id = Id::new();
        let paths = mgr.create_swarm_workspace(swarm_id).await.unwrap();
        let agent_id = AgentId::new(swarm_id, AgentType::Coder, 0);
        let ws = mgr
            .create_agent_workspace(&paths, &agent_id, None)
            .await
            .unwrap();
        mgr.teardown_agent_workspace(&ws, RetentionPolicy::Keep)
            .await
            .unwrap();
        assert!(ws.dir.exists());
    }
}
