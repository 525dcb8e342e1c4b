//! Domain ports (interfaces) for the swarm core.

pub mod kv_store;

pub use kv_store::KvStore;
