//! Shared fixtures for the integration suite: worker "LLM CLI" stand-ins
//! written as real shell scripts, since [`swarm_core::services::supervisor::Supervisor`]
//! spawns `cmd.executable` directly rather than through a shell — the same
//! approach the crate's own unit tests use with `/bin/sh`/`/bin/true`, just
//! packaged as standalone files so several integration tests can share one
//! shape.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use swarm_core::domain::models::SwarmOptions;
use swarm_core::services::CoreRuntime;

/// Write `body` (a `#!/bin/sh` script) to `dir` and mark it executable.
/// Returns the script's path, suitable as a [`CoreRuntime`]'s `llm_cli_path`.
pub fn write_worker_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A worker script that always exits successfully, ignoring its prompt/flag
/// arguments the same way the unit tests' `/bin/true` does. Writes a
/// deliverable file into its working directory (the agent workspace, per
/// the worker's cwd invariant) so coding/research/documentation tasks —
/// which require a harvested file on top of a zero exit code — also see
/// `success=true`.
pub fn always_succeeds(dir: &std::path::Path) -> PathBuf {
    write_worker_script(dir, "succeed.sh", "echo done > result.txt\nexit 0")
}

/// A worker script that always fails.
pub fn always_fails(dir: &std::path::Path) -> PathBuf {
    write_worker_script(dir, "fail.sh", "exit 1")
}

/// A worker script that sleeps longer than any reasonable task timeout.
pub fn sleeps_forever(dir: &std::path::Path) -> PathBuf {
    write_worker_script(dir, "sleep.sh", "sleep 300")
}

/// A worker script that fails on its first invocation for a given task and
/// succeeds on every subsequent one. Tracked via a counter file under
/// `/tmp`, keyed by the `SWARM_ID`/`TASK_ID` environment variables the
/// scheduler always sets (`build_worker_spec` in `scheduler.rs`), so
/// repeated attempts at the same task — each of which gets a fresh agent
/// workspace directory — still share one counter.
pub fn fails_once_then_succeeds(dir: &std::path::Path) -> PathBuf {
    write_worker_script(
        dir,
        "flaky.sh",
        r#"
counter_dir="/tmp/swarm-test-attempts-$SWARM_ID"
counter_file="$counter_dir/$TASK_ID"
mkdir -p "$counter_dir"
if [ -f "$counter_file" ]; then
    exit 0
else
    touch "$counter_file"
    exit 1
fi
"#,
    )
}

pub fn runtime_with(workspace_root: impl Into<PathBuf>, llm_cli_path: impl Into<String>) -> Arc<CoreRuntime> {
    let mut options = SwarmOptions::default();
    options.workspace_root = workspace_root.into();
    options.swarm_timeout = std::time::Duration::from_secs(20);
    options.task_timeout = std::time::Duration::from_secs(5);
    Arc::new(CoreRuntime::new(options, llm_cli_path, vec![]))
}
