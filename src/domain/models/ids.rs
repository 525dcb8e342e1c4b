//! Opaque identifiers used throughout the swarm core.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A stable, globally-unique identifier for a single entity (task, agent
/// instance, swarm objective, lock, memory entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(Uuid);

impl Id {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID (used when reconstructing from a snapshot).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First 8 hex characters, for compact log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an agent, additionally carrying the fields needed for
/// human-readable display (`coder-2@swarm-ab12cd34`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId {
    id: Id,
    pub swarm: Id,
    pub agent_type: super::agent::AgentType,
    pub instance: u32,
}

impl AgentId {
    /// Construct a new agent id for the given swarm, type, and instance number.
    pub fn new(swarm: Id, agent_type: super::agent::AgentType, instance: u32) -> Self {
        Self {
            id: Id::new(),
            swarm,
            agent_type,
            instance,
        }
    }

    /// The opaque identity used as a map key.
    pub fn id(&self) -> Id {
        self.id
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}@{}",
            self.agent_type.as_str(),
            self.instance,
            self.swarm.short()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent::AgentType;

    #[test]
    fn id_short_is_eight_hex_chars() {
        let id = Id::new();
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn agent_id_display_format() {
        let swarm = Id::new();
        let aid = AgentId::new(swarm, AgentType::Coder, 2);
        let rendered = aid.to_string();
        assert!(rendered.starts_with("coder-2@"));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(Id::new(), Id::new());
    }
}
