//! End-to-end happy path through a linear task chain: every task succeeds
//! on its first attempt and the objective reaches `Completed`.

#[path = "support/mod.rs"]
mod support;

use swarm_core::domain::models::{ObjectiveStatus, Strategy};
use swarm_core::services::SwarmCoordinator;

#[tokio::test]
async fn testing_strategy_linear_chain_completes() {
    let workspace = tempfile::tempdir().unwrap();
    let scripts = tempfile::tempdir().unwrap();
    let worker = support::always_succeeds(scripts.path());

    let runtime = support::runtime_with(workspace.path(), worker.display().to_string());
    let coordinator = SwarmCoordinator::new(runtime);

    let result = coordinator
        .run_objective("verify the release candidate", Strategy::Testing)
        .await
        .unwrap();

    assert_eq!(result.status, ObjectiveStatus::Completed);
    assert_eq!(result.tasks_failed, 0);
    assert_eq!(result.tasks_cancelled, 0);
    assert_eq!(result.tasks_completed, 3); // test planning -> implementation -> execution
}
