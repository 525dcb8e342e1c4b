//! Objective Decomposer (C4): `(objective, strategy, maxAgents) -> (taskGraph,
//! agentTeam)`.
//!
//! A pure, synchronous, deterministic module — no I/O, no async. Grounded on
//! `dependency_resolver.rs`'s style of a small stateless struct exposing
//! plain `fn` methods that return owned data rather than mutating shared
//! state.

use std::collections::BTreeSet;

use crate::domain::models::{
    AgentType, Capability, Id, Strategy, Task, TaskPriority, TaskType,
};

/// One seat on the agent team the decomposer proposes. Not yet a live
/// [`crate::domain::models::Agent`] — the Swarm Coordinator instantiates
/// one from each profile when a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub agent_type: AgentType,
    pub name: String,
    pub capabilities: BTreeSet<Capability>,
    pub priority: TaskPriority,
    /// Hierarchical placement layer this seat is assigned (§4.5).
    pub layer: u32,
}

impl AgentProfile {
    fn new(agent_type: AgentType, name: impl Into<String>, layer: u32, priority: TaskPriority) -> Self {
        Self {
            agent_type,
            name: name.into(),
            capabilities: agent_type.default_capabilities(),
            priority,
            layer,
        }
    }
}

/// Output of a single decomposition pass.
#[derive(Debug, Clone)]
pub struct DecomposedObjective {
    pub tasks: Vec<Task>,
    pub team: Vec<AgentProfile>,
}

/// Stateless decomposition engine. Holds no mutable state; `new()` exists
/// only to mirror the teacher's constructor convention for its service
/// structs, matching the `DependencyResolver`/`PriorityCalculator` shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectiveDecomposer;

impl ObjectiveDecomposer {
    pub fn new() -> Self {
        Self
    }

    /// Build the task graph and agent team for `objective` under `strategy`,
    /// capped at `max_agents` seats.
    pub fn decompose(&self, objective: &str, strategy: Strategy, max_agents: u32) -> DecomposedObjective {
        let resolved = match strategy {
            Strategy::Auto => Self::resolve_auto(objective),
            other => other,
        };
        let (tasks, team) = match resolved {
            Strategy::Research => Self::research_plan(),
            Strategy::Development => Self::development_plan(),
            Strategy::Analysis => Self::analysis_plan(),
            Strategy::Testing => Self::testing_plan(),
            Strategy::Optimization => Self::optimization_plan(),
            Strategy::Maintenance => Self::maintenance_plan(),
            Strategy::Auto => Self::minimal_pipeline(),
        };
        let team = Self::cap_team(team, max_agents);
        DecomposedObjective { tasks, team }
    }

    /// Keyword inspection for `auto`: `research`/`build`/`fix`/`optimi*`
    /// etc. pick the closest named strategy; no match falls through to the
    /// minimal `analyze -> implement -> validate` pipeline (§4.4).
    fn resolve_auto(objective: &str) -> Strategy {
        let lower = objective.to_lowercase();
        let has = |kw: &str| lower.contains(kw);
        if has("research") || has("investigate") || has("survey") {
            Strategy::Research
        } else if has("build") || has("implement") || has("develop") || has("create") {
            Strategy::Development
        } else if has("fix") || has("bug") || has("debug") || has("repair") {
            Strategy::Maintenance
        } else if has("optimi") || has("speed up") || has("performance") {
            Strategy::Optimization
        } else if has("test") || has("verify") || has("validate") {
            Strategy::Testing
        } else if has("analy") {
            Strategy::Analysis
        } else {
            Strategy::Auto // signals "no match" to `decompose`
        }
    }

    fn cap_team(team: Vec<AgentProfile>, max_agents: u32) -> Vec<AgentProfile> {
        let cap = max_agents.max(1) as usize;
        team.into_iter().take(cap).collect()
    }

    /// `research -> team of 1 coordinator + researchers + analyst`; tasks:
    /// literature review -> (primary research + data analysis, parallel,
    /// both depend on literature review) -> synthesis (depends on all three).
    fn research_plan() -> (Vec<Task>, Vec<AgentProfile>) {
        let team = vec![
            AgentProfile::new(AgentType::Coordinator, "coordinator", 0, TaskPriority::High),
            AgentProfile::new(AgentType::Researcher, "researcher-1", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Analyst, "analyst-1", 1, TaskPriority::Normal),
        ];

        let literature_review = Task::new(
            "literature review",
            "Survey existing work relevant to the objective",
            TaskType::Research,
            TaskPriority::High,
        )
        .with_layer(0);
        let lit_id = literature_review.id;

        let primary_research = Task::new(
            "primary research",
            "Conduct original research informed by the literature review",
            TaskType::Research,
            TaskPriority::Normal,
        )
        .with_dependencies(vec![lit_id])
        .with_layer(1);

        let data_analysis = Task::new(
            "data analysis",
            "Analyze data gathered during research",
            TaskType::Analysis,
            TaskPriority::Normal,
        )
        .with_dependencies(vec![lit_id])
        .with_preferred_type(AgentType::Analyst)
        .with_layer(1);

        let synthesis = Task::new(
            "synthesis",
            "Synthesize literature review, primary research, and analysis into findings",
            TaskType::Documentation,
            TaskPriority::Normal,
        )
        .with_dependencies(vec![lit_id, primary_research.id, data_analysis.id])
        .with_layer(2);

        (vec![literature_review, primary_research, data_analysis, synthesis], team)
    }

    /// `development -> coordinator + architect + two coders + tester`;
    /// tasks: architecture -> (backend + frontend, parallel) -> test suite.
    fn development_plan() -> (Vec<Task>, Vec<AgentProfile>) {
        let team = vec![
            AgentProfile::new(AgentType::Coordinator, "coordinator", 0, TaskPriority::High),
            AgentProfile::new(AgentType::Architect, "architect-1", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Coder, "coder-1", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Coder, "coder-2", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Tester, "tester-1", 2, TaskPriority::Normal),
        ];

        let architecture = Task::new(
            "architecture",
            "Design the system architecture for the objective",
            TaskType::Coding,
            TaskPriority::High,
        )
        .with_preferred_type(AgentType::Architect)
        .with_layer(0);
        let arch_id = architecture.id;

        let backend = Task::new(
            "backend impl",
            "Implement the backend per the architecture",
            TaskType::Coding,
            TaskPriority::Normal,
        )
        .with_dependencies(vec![arch_id])
        .with_layer(1);

        let frontend = Task::new(
            "frontend impl",
            "Implement the frontend per the architecture",
            TaskType::Coding,
            TaskPriority::Normal,
        )
        .with_dependencies(vec![arch_id])
        .with_layer(1);

        let test_suite = Task::new(
            "test suite",
            "Write and run the test suite against both implementations",
            TaskType::Testing,
            TaskPriority::Normal,
        )
        .with_dependencies(vec![backend.id, frontend.id])
        .with_preferred_type(AgentType::Tester)
        .with_layer(2);

        (vec![architecture, backend, frontend, test_suite], team)
    }

    fn analysis_plan() -> (Vec<Task>, Vec<AgentProfile>) {
        let team = vec![
            AgentProfile::new(AgentType::Coordinator, "coordinator", 0, TaskPriority::High),
            AgentProfile::new(AgentType::Analyst, "analyst-1", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Researcher, "researcher-1", 1, TaskPriority::Normal),
        ];
        Self::linear_chain(
            team,
            [
                ("data collection", TaskType::Research, AgentType::Researcher),
                ("analysis", TaskType::Analysis, AgentType::Analyst),
                ("report", TaskType::Documentation, AgentType::Analyst),
            ],
        )
    }

    fn testing_plan() -> (Vec<Task>, Vec<AgentProfile>) {
        let team = vec![
            AgentProfile::new(AgentType::Coordinator, "coordinator", 0, TaskPriority::High),
            AgentProfile::new(AgentType::Tester, "tester-1", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Tester, "tester-2", 1, TaskPriority::Normal),
        ];
        Self::linear_chain(
            team,
            [
                ("test planning", TaskType::Testing, AgentType::Tester),
                ("test implementation", TaskType::Testing, AgentType::Tester),
                ("test execution", TaskType::Testing, AgentType::Tester),
            ],
        )
    }

    fn optimization_plan() -> (Vec<Task>, Vec<AgentProfile>) {
        let team = vec![
            AgentProfile::new(AgentType::Coordinator, "coordinator", 0, TaskPriority::High),
            AgentProfile::new(AgentType::Optimizer, "optimizer-1", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Tester, "tester-1", 1, TaskPriority::Normal),
        ];
        Self::linear_chain(
            team,
            [
                ("baseline measurement", TaskType::Analysis, AgentType::Optimizer),
                ("optimization", TaskType::Coding, AgentType::Optimizer),
                ("validation", TaskType::Testing, AgentType::Tester),
            ],
        )
    }

    fn maintenance_plan() -> (Vec<Task>, Vec<AgentProfile>) {
        let team = vec![
            AgentProfile::new(AgentType::Coordinator, "coordinator", 0, TaskPriority::High),
            AgentProfile::new(AgentType::Coder, "coder-1", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Tester, "tester-1", 1, TaskPriority::Normal),
        ];
        Self::linear_chain(
            team,
            [
                ("triage", TaskType::Analysis, AgentType::Coder),
                ("fix", TaskType::Coding, AgentType::Coder),
                ("verification", TaskType::Testing, AgentType::Tester),
            ],
        )
    }

    /// `auto` fallback with no keyword match: minimal three-stage pipeline.
    fn minimal_pipeline() -> (Vec<Task>, Vec<AgentProfile>) {
        let team = vec![
            AgentProfile::new(AgentType::Coordinator, "coordinator", 0, TaskPriority::High),
            AgentProfile::new(AgentType::Coder, "coder-1", 1, TaskPriority::Normal),
            AgentProfile::new(AgentType::Tester, "tester-1", 1, TaskPriority::Normal),
        ];
        Self::linear_chain(
            team,
            [
                ("analyze requirements", TaskType::Analysis, AgentType::Coder),
                ("implement", TaskType::Coding, AgentType::Coder),
                ("validate", TaskType::Testing, AgentType::Tester),
            ],
        )
    }

    /// Build an N-stage linear dependency chain, each stage depending only
    /// on its immediate predecessor, layered in lockstep with chain depth.
    fn linear_chain<const N: usize>(
        team: Vec<AgentProfile>,
        stages: [(&str, TaskType, AgentType); N],
    ) -> (Vec<Task>, Vec<AgentProfile>) {
        let mut tasks = Vec::with_capacity(N);
        let mut prev: Option<Id> = None;
        for (layer, (name, task_type, preferred_type)) in stages.into_iter().enumerate() {
            let mut task = Task::new(name, name, task_type, TaskPriority::Normal)
                .with_preferred_type(preferred_type)
                .with_layer(layer as u32);
            if let Some(dep) = prev {
                task = task.with_dependencies(vec![dep]);
            }
            prev = Some(task.id);
            tasks.push(task);
        }
        (tasks, team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn research_strategy_produces_four_tasks_with_synthesis_depending_on_all() {
        let d = ObjectiveDecomposer::new();
        let out = d.decompose("understand the market", Strategy::Research, 5);
        assert_eq!(out.tasks.len(), 4);
        let synthesis = out.tasks.iter().find(|t| t.name == "synthesis").unwrap();
        assert_eq!(synthesis.dependencies.len(), 3);
        assert!(out.team.iter().any(|p| p.agent_type == AgentType::Coordinator));
    }

    #[test]
    fn development_strategy_fans_out_then_in() {
        let d = ObjectiveDecomposer::new();
        let out = d.decompose("build a widget", Strategy::Development, 10);
        let backend = out.tasks.iter().find(|t| t.name == "backend impl").unwrap();
        let frontend = out.tasks.iter().find(|t| t.name == "frontend impl").unwrap();
        let arch = out.tasks.iter().find(|t| t.name == "architecture").unwrap();
        assert_eq!(backend.dependencies, vec![arch.id]);
        assert_eq!(frontend.dependencies, vec![arch.id]);
        let test_suite = out.tasks.iter().find(|t| t.name == "test suite").unwrap();
        assert!(test_suite.dependencies.contains(&backend.id));
        assert!(test_suite.dependencies.contains(&frontend.id));
    }

    #[test]
    fn auto_strategy_picks_development_on_build_keyword() {
        let d = ObjectiveDecomposer::new();
        let out = d.decompose("build the login page", Strategy::Auto, 5);
        assert!(out.tasks.iter().any(|t| t.name == "architecture"));
    }

    #[test]
    fn auto_strategy_falls_back_to_minimal_pipeline_on_no_keyword_match() {
        let d = ObjectiveDecomposer::new();
        let out = d.decompose("do the thing", Strategy::Auto, 5);
        let names: Vec<&str> = out.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["analyze requirements", "implement", "validate"]);
    }

    #[test]
    fn team_is_capped_at_max_agents() {
        let d = ObjectiveDecomposer::new();
        let out = d.decompose("build something", Strategy::Development, 2);
        assert_eq!(out.team.len(), 2);
        assert_eq!(out.team[0].agent_type, AgentType::Coordinator);
    }

    #[test]
    fn every_task_requirement_derives_from_its_type() {
        let d = ObjectiveDecomposer::new();
        let out = d.decompose("research a thing", Strategy::Research, 5);
        for task in &out.tasks {
            assert_eq!(task.requirements.capabilities, task.task_type.implied_capabilities());
        }
    }
}
