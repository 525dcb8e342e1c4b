//! Cross-agent memory entry (the Shared Memory KV, §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::Id;

/// Owner of a memory entry: a specific agent, or the coordinator itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryOwner {
    Agent(Id),
    System,
}

/// A value stored in the cross-agent KV, keyed by `(namespace, key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub namespace: String,
    pub key: String,
    pub value: serde_json::Value,
    pub type_tag: String,
    pub tags: BTreeSet<String>,
    pub owner: MemoryOwner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
        owner: MemoryOwner,
    ) -> Self {
        let now = Utc::now();
        Self {
            namespace: namespace.into(),
            key: key.into(),
            value,
            type_tag: "generic".to_string(),
            tags: BTreeSet::new(),
            owner,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    pub fn with_type(mut self, type_tag: impl Into<String>) -> Self {
        self.type_tag = type_tag.into();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.expires_at = Some(Utc::now() + ttl);
        self
    }

    /// Expired entries are invisible to reads and eligible for lazy deletion.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp <= Utc::now())
    }

    /// Overwrite the value in place, bumping `updated_at` (last-writer-wins).
    pub fn overwrite(&mut self, value: serde_json::Value) {
        self.value = value;
        self.updated_at = Utc::now();
    }
}

/// The unique key for a memory entry: `(namespace, key)`.
pub type MemoryKey = (String, String);

/// Filter used by `searchMemory`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub namespace: Option<String>,
    pub tag: Option<String>,
    pub owner: Option<MemoryOwner>,
}

impl MemoryFilter {
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if entry.is_expired() {
            return false;
        }
        if let Some(ns) = &self.namespace {
            if &entry.namespace != ns {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !entry.tags.contains(tag) {
                return false;
            }
        }
        if let Some(owner) = &self.owner {
            if &entry.owner != owner {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_expiry() {
        let e = MemoryEntry::new("ns", "k", serde_json::json!(1), MemoryOwner::System)
            .with_ttl(chrono::Duration::seconds(-1));
        assert!(e.is_expired());
    }

    #[test]
    fn overwrite_is_last_writer_wins() {
        let mut e = MemoryEntry::new("ns", "k", serde_json::json!(1), MemoryOwner::System);
        let first_updated = e.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        e.overwrite(serde_json::json!(2));
        assert_eq!(e.value, serde_json::json!(2));
        assert!(e.updated_at >= first_updated);
    }

    #[test]
    fn filter_excludes_expired() {
        let e = MemoryEntry::new("ns", "k", serde_json::json!(1), MemoryOwner::System)
            .with_ttl(chrono::Duration::seconds(-1));
        let f = MemoryFilter::default();
        assert!(!f.matches(&e));
    }

    #[test]
    fn filter_matches_namespace_and_tag() {
        let e = MemoryEntry::new("ns", "k", serde_json::json!(1), MemoryOwner::System)
            .with_tags(["alpha".to_string()]);
        let f = MemoryFilter {
            namespace: Some("ns".to_string()),
            tag: Some("alpha".to_string()),
            owner: None,
        };
        assert!(f.matches(&e));
        let f2 = MemoryFilter {
            namespace: Some("other".to_string()),
            ..Default::default()
        };
        assert!(!f2.matches(&e));
    }
}
