//! Snapshotting [`KvStore`] that mirrors its state to a single
//! `shared-memory.json` file (§6 external contract), written atomically via
//! a write-to-temp-then-rename, so a crash never leaves a torn file behind.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::ports::KvStore;

pub struct JournalKvStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl JournalKvStore {
    /// Load existing state from `path` if present, otherwise start empty.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let data = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|e| CoreError::IoError(e.to_string()))?;
            let encoded: BTreeMap<String, String> =
                serde_json::from_slice(&bytes).map_err(|e| CoreError::IoError(e.to_string()))?;
            encoded
                .into_iter()
                .map(|(k, v)| {
                    let bytes = BASE64
                        .decode(v)
                        .map_err(|e| CoreError::IoError(e.to_string()))?;
                    Ok((k, bytes))
                })
                .collect::<CoreResult<BTreeMap<_, _>>>()?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Write the full snapshot to disk, atomically.
    fn flush(&self) -> CoreResult<()> {
        let data = self.data.read().unwrap();
        let encoded: BTreeMap<String, String> = data
            .iter()
            .map(|(k, v)| (k.clone(), BASE64.encode(v)))
            .collect();
        let json =
            serde_json::to_vec_pretty(&encoded).map_err(|e| CoreError::IoError(e.to_string()))?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| CoreError::IoError(e.to_string()))?;
        let tmp_path = dir.join(format!(
            ".{}.tmp",
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("shared-memory.json")
        ));
        std::fs::write(&tmp_path, json).map_err(|e| CoreError::IoError(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| CoreError::IoError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JournalKvStore {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> CoreResult<()> {
        self.data.write().unwrap().insert(key.to_string(), value);
        self.flush()
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.data.write().unwrap().remove(key);
        self.flush()
    }

    async fn list_prefix(&self, prefix: &str) -> CoreResult<Vec<String>> {
        Ok(self
            .data
            .read()
            .unwrap()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared-memory.json");
        {
            let store = JournalKvStore::open(&path).unwrap();
            store.put("tasks:1", b"payload".to_vec()).await.unwrap();
        }
        let reopened = JournalKvStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("tasks:1").await.unwrap(),
            Some(b"payload".to_vec())
        );
    }

    #[tokio::test]
    async fn delete_then_reopen_sees_no_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared-memory.json");
        let store = JournalKvStore::open(&path).unwrap();
        store.put("a", b"x".to_vec()).await.unwrap();
        store.delete("a").await.unwrap();
        let reopened = JournalKvStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn binary_values_round_trip_through_base64_encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared-memory.json");
        let store = JournalKvStore::open(&path).unwrap();
        let payload: Vec<u8> = vec![0, 255, 128, 1, 2, 3, 4, 5];
        store.put("bin", payload.clone()).await.unwrap();
        let reopened = JournalKvStore::open(&path).unwrap();
        assert_eq!(reopened.get("bin").await.unwrap(), Some(payload));
    }
}
