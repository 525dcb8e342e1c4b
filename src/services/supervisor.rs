//! Worker Process Supervisor (C2).
//!
//! Directly grounded on `ClaudeCodeSubstrate::execute`'s spawn / immediate
//! stdin-close / `tokio::time::timeout`-wrapped read loop / `child.kill()`
//! pattern, generalized into a reusable `Supervisor` with a per-handle
//! `tokio::sync::broadcast` event channel and a graceful-then-forceful kill
//! staged over two sequential `tokio::time::sleep` windows.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::domain::error::CoreError;
use crate::domain::models::Id;

/// Default ring-buffer cap on buffered stdout/stderr (§4.2 step 3).
pub const DEFAULT_OUTPUT_CAP_BYTES: usize = 8 * 1024 * 1024;
/// Default grace window between SIGTERM and SIGKILL (§4.2 step 4).
pub const DEFAULT_GRACE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the supervisor needs to launch one worker process.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub executable: String,
    pub argv: Vec<String>,
    pub cwd: std::path::PathBuf,
    pub env: HashMap<String, String>,
    pub allowed_tools: Vec<String>,
    pub stdin_content: Option<String>,
    pub close_stdin: bool,
    pub task_timeout: Duration,
    pub grace_timeout: Duration,
}

impl WorkerSpec {
    pub fn new(executable: impl Into<String>, cwd: impl Into<std::path::PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            argv: Vec::new(),
            cwd: cwd.into(),
            env: HashMap::new(),
            allowed_tools: Vec::new(),
            stdin_content: None,
            close_stdin: true,
            task_timeout: Duration::from_secs(300),
            grace_timeout: DEFAULT_GRACE_TIMEOUT,
        }
    }

    pub fn with_argv(mut self, argv: Vec<String>) -> Self {
        self.argv = argv;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = tools;
        self
    }

    pub fn with_stdin(mut self, content: impl Into<String>) -> Self {
        self.stdin_content = Some(content.into());
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_grace_timeout(mut self, timeout: Duration) -> Self {
        self.grace_timeout = timeout;
        self
    }
}

/// Events emitted over the lifetime of one worker (§4.2 `WorkerHandle`).
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Started { pid: u32 },
    StdoutChunk(String),
    StderrChunk(String),
    Exited(ExitOutcome),
    Error(String),
}

/// `ExitOutcome` (§4.2): the final, authoritative record of a worker's run.
#[derive(Debug, Clone)]
pub struct ExitOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub output: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

enum KillMode {
    Graceful,
    Force,
}

/// A handle to one spawned worker. Holds the kill sender and the broadcast
/// receiver factory; the process itself is driven to completion by a
/// detached task spawned in [`Supervisor::spawn`].
pub struct WorkerHandle {
    pub id: Id,
    pub pid: u32,
    pub started_at: Instant,
    events_tx: broadcast::Sender<WorkerEvent>,
    kill_tx: tokio::sync::mpsc::UnboundedSender<KillMode>,
    outcome: Arc<Mutex<Option<ExitOutcome>>>,
    done: Arc<tokio::sync::Notify>,
}

impl WorkerHandle {
    /// Subscribe to this worker's event stream. Events before subscription
    /// are not replayed — callers should subscribe before the worker can
    /// have exited, which `Supervisor::spawn` guarantees.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events_tx.subscribe()
    }

    /// Request a kill. `graceful` sends SIGTERM and lets the grace window
    /// run its course; `!graceful` force-kills immediately.
    pub fn kill(&self, graceful: bool) {
        let mode = if graceful {
            KillMode::Graceful
        } else {
            KillMode::Force
        };
        let _ = self.kill_tx.send(mode);
    }

    /// Wait for the worker to reach a terminal outcome.
    pub async fn wait(&self) -> ExitOutcome {
        loop {
            if let Some(outcome) = self.outcome.lock().await.clone() {
                return outcome;
            }
            self.done.notified().await;
        }
    }
}

/// Spawns and supervises worker processes. Reentrant — state lives entirely
/// in per-handle structures, plus a registry keyed by [`Id`] so callers can
/// cancel by id (§4.2 Concurrency).
#[derive(Default)]
pub struct Supervisor {
    registry: RwLock<HashMap<Id, Arc<WorkerHandle>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `spawn(spec) → WorkerHandle`.
    pub async fn spawn(&self, spec: WorkerSpec) -> Result<Arc<WorkerHandle>, CoreError> {
        let mut cmd = Command::new(&spec.executable);
        cmd.args(&spec.argv)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| CoreError::SpawnFailed(format!("{}: {e}", spec.executable)))?;

        let pid = child
            .id()
            .ok_or_else(|| CoreError::SpawnFailed("process exited before pid was available".into()))?;

        if let Some(content) = spec.stdin_content.clone() {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(content.as_bytes()).await;
            }
        }
        if spec.close_stdin {
            drop(child.stdin.take());
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (events_tx, _) = broadcast::channel(256);
        let (kill_tx, mut kill_rx) = tokio::sync::mpsc::unbounded_channel::<KillMode>();
        let outcome = Arc::new(Mutex::new(None));
        let done = Arc::new(tokio::sync::Notify::new());

        let id = Id::new();
        let handle = Arc::new(WorkerHandle {
            id,
            pid,
            started_at: Instant::now(),
            events_tx: events_tx.clone(),
            kill_tx,
            outcome: outcome.clone(),
            done: done.clone(),
        });

        let _ = events_tx.send(WorkerEvent::Started { pid });

        let task_timeout = spec.task_timeout;
        let grace_timeout = spec.grace_timeout;
        let started_at = handle.started_at;

        tokio::spawn(async move {
            let read_loop = async {
                let stdout_tx = events_tx.clone();
                let stderr_tx = events_tx.clone();
                // Drain stdout and stderr concurrently — a worker that fills
                // its stderr pipe before closing stdout would otherwise block
                // this task reading stdout while the child blocks writing
                // stderr, deadlocking until the task timeout fires.
                let stdout_fut = async move {
                    let mut buf = String::new();
                    if let Some(out) = stdout {
                        let mut reader = BufReader::new(out);
                        let mut line = String::new();
                        while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                            buf.push_str(&line);
                            truncate_to_cap(&mut buf, DEFAULT_OUTPUT_CAP_BYTES);
                            let _ = stdout_tx.send(WorkerEvent::StdoutChunk(line.clone()));
                            line.clear();
                        }
                    }
                    buf
                };
                let stderr_fut = async move {
                    let mut buf = String::new();
                    if let Some(err) = stderr {
                        let mut reader = BufReader::new(err);
                        let mut line = String::new();
                        while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                            buf.push_str(&line);
                            truncate_to_cap(&mut buf, DEFAULT_OUTPUT_CAP_BYTES);
                            let _ = stderr_tx.send(WorkerEvent::StderrChunk(line.clone()));
                            line.clear();
                        }
                    }
                    buf
                };
                let (stdout_buf, stderr_buf) = tokio::join!(stdout_fut, stderr_fut);
                let status = child.wait().await;
                (stdout_buf, stderr_buf, status)
            };

            tokio::pin!(read_loop);

            enum FirstEvent {
                Exited(std::io::Result<std::process::ExitStatus>, String, String),
                TimedOut,
                ForceKillRequested,
                GracefulKillRequested,
            }

            let first = tokio::select! {
                (out, err, status) = &mut read_loop => FirstEvent::Exited(status, out, err),
                _ = tokio::time::sleep(task_timeout) => FirstEvent::TimedOut,
                Some(mode) = kill_rx.recv() => match mode {
                    KillMode::Graceful => FirstEvent::GracefulKillRequested,
                    KillMode::Force => FirstEvent::ForceKillRequested,
                },
            };

            let timed_out_initially = matches!(first, FirstEvent::TimedOut);
            let mut timed_out = timed_out_initially;
            let (stdout_buf, stderr_buf, status) = match first {
                FirstEvent::Exited(status, out, err) => (out, err, status),
                FirstEvent::ForceKillRequested => {
                    timed_out = false;
                    let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                    let (out, err, status) = read_loop.await;
                    (out, err, status)
                }
                FirstEvent::TimedOut | FirstEvent::GracefulKillRequested => {
                    let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
                    let grace = tokio::time::sleep(grace_timeout);
                    tokio::pin!(grace);
                    tokio::select! {
                        (out, err, status) = &mut read_loop => (out, err, status),
                        _ = &mut grace => {
                            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                            let (out, err, status) = read_loop.await;
                            (out, err, status)
                        }
                    }
                }
            };

            let duration = started_at.elapsed();
            let final_outcome = match status {
                Ok(status) => ExitOutcome {
                    success: status.success() && !timed_out,
                    exit_code: status.code(),
                    #[cfg(unix)]
                    signal: {
                        use std::os::unix::process::ExitStatusExt;
                        status.signal()
                    },
                    #[cfg(not(unix))]
                    signal: None,
                    output: stdout_buf,
                    stderr: stderr_buf,
                    duration,
                    timed_out,
                },
                Err(e) => ExitOutcome {
                    success: false,
                    exit_code: None,
                    signal: None,
                    output: stdout_buf,
                    stderr: format!("{stderr_buf}\nwait() failed: {e}"),
                    duration,
                    timed_out,
                },
            };

            *outcome.lock().await = Some(final_outcome.clone());
            let _ = events_tx.send(WorkerEvent::Exited(final_outcome));
            done.notify_waiters();
        });

        self.registry.write().await.insert(id, handle.clone());
        Ok(handle)
    }

    /// Look up a previously-spawned worker by id, for cancellation.
    pub async fn get(&self, id: Id) -> Option<Arc<WorkerHandle>> {
        self.registry.read().await.get(&id).cloned()
    }

    /// Kill every still-registered worker (used on swarm cancel/timeout).
    pub async fn kill_all(&self, graceful: bool) {
        for handle in self.registry.read().await.values() {
            handle.kill(graceful);
        }
    }
}

fn truncate_to_cap(buf: &mut String, cap: usize) {
    if buf.len() > cap {
        let excess = buf.len() - cap;
        *buf = buf.split_off(excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec_for(script: &str) -> WorkerSpec {
        WorkerSpec::new("/bin/sh", std::env::temp_dir())
            .with_argv(vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn successful_exit_yields_success_outcome() {
        let supervisor = Supervisor::new();
        let handle = supervisor
            .spawn(spec_for("echo hello").with_task_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        let outcome = handle.wait().await;
        assert!(outcome.success);
        assert!(outcome.output.contains("hello"));
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_success() {
        let supervisor = Supervisor::new();
        let handle = supervisor
            .spawn(spec_for("exit 7").with_task_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        let outcome = handle.wait().await;
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(7));
    }

    #[tokio::test]
    async fn timeout_kills_worker_and_marks_timed_out() {
        let supervisor = Supervisor::new();
        let handle = supervisor
            .spawn(
                spec_for("sleep 5")
                    .with_task_timeout(Duration::from_millis(200))
                    .with_grace_timeout(Duration::from_millis(200)),
            )
            .await
            .unwrap();
        let outcome = handle.wait().await;
        assert!(outcome.timed_out);
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn registry_lookup_finds_spawned_worker() {
        let supervisor = Supervisor::new();
        let handle = supervisor
            .spawn(spec_for("echo hi").with_task_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        let found = supervisor.get(handle.id).await;
        assert!(found.is_some());
    }

    #[test]
    fn truncate_to_cap_keeps_only_the_tail() {
        let mut s = "abcdef".to_string();
        truncate_to_cap(&mut s, 3);
        assert_eq!(s, "def");
    }
}
