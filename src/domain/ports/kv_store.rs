//! Pluggable persistence port.
//!
//! The core treats persistence as a KV port (§1 scope note): a minimal,
//! swappable interface with an in-memory default
//! ([`crate::adapters::memory_kv::InMemoryKvStore`]) and a snapshotting
//! journal adapter ([`crate::adapters::journal_kv::JournalKvStore`]) that
//! satisfies the `shared-memory.json` external contract in §6. Durable
//! database drivers (sqlx, etc.) are explicitly out of scope for the core.

use async_trait::async_trait;

use crate::domain::error::CoreResult;

/// A minimal byte-oriented key/value port. Keys are opaque strings chosen
/// by the caller (the Shared Store namespaces them, e.g. `"agents"`,
/// `"tasks"`, `"memory:<ns>:<key>"`).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> CoreResult<()>;
    async fn delete(&self, key: &str) -> CoreResult<()>;
    /// List every key under a given prefix, for recovery/inspection.
    async fn list_prefix(&self, prefix: &str) -> CoreResult<Vec<String>>;
}
