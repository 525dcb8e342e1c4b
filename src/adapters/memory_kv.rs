//! Pure in-memory [`KvStore`], the default backing for a single `swarm run`
//! process. No persistence across restarts.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::domain::error::CoreResult;
use crate::domain::ports::KvStore;

#[derive(Default)]
pub struct InMemoryKvStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> CoreResult<()> {
        self.data.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.data.write().unwrap().remove(key);
        Ok(())
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

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryKvStore::new();
        store.put("a", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = InMemoryKvStore::new();
        store.put("a", b"hello".to_vec()).await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_prefix_filters_correctly() {
        let store = InMemoryKvStore::new();
        store.put("tasks:1", b"a".to_vec()).await.unwrap();
        store.put("tasks:2", b"b".to_vec()).await.unwrap();
        store.put("agents:1", b"c".to_vec()).await.unwrap();
        let mut keys = store.list_prefix("tasks:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["tasks:1".to_string(), "tasks:2".to_string()]);
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }
}
