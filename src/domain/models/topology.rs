//! Placement topology selection (§4.5).

use serde::{Deserialize, Serialize};

/// Placement policy governing how ready tasks are mapped to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Centralized,
    Hierarchical,
    Mesh,
    #[default]
    Hybrid,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Centralized => "centralized",
            Self::Hierarchical => "hierarchical",
            Self::Mesh => "mesh",
            Self::Hybrid => "hybrid",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "centralized" => Some(Self::Centralized),
            "hierarchical" => Some(Self::Hierarchical),
            "mesh" => Some(Self::Mesh),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Strategy the Objective Decomposer uses to build a task graph + team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Auto,
    Research,
    Development,
    Analysis,
    Testing,
    Optimization,
    Maintenance,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Research => "research",
            Self::Development => "development",
            Self::Analysis => "analysis",
            Self::Testing => "testing",
            Self::Optimization => "optimization",
            Self::Maintenance => "maintenance",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "research" => Some(Self::Research),
            "development" => Some(Self::Development),
            "analysis" => Some(Self::Analysis),
            "testing" => Some(Self::Testing),
            "optimization" => Some(Self::Optimization),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_round_trips_through_strings() {
        for t in [
            Topology::Centralized,
            Topology::Hierarchical,
            Topology::Mesh,
            Topology::Hybrid,
        ] {
            assert_eq!(Topology::from_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn default_topology_is_hybrid() {
        assert_eq!(Topology::default(), Topology::Hybrid);
    }
}
