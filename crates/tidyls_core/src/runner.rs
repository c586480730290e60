//! clang-tidy process runner.
//!
//! At most one analysis runs at a time. Starting a run, or calling
//! [`TidyRunner::supersede`], terminates whatever run is still in flight.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, info, warn};

use crate::TidyError;
use crate::config::TidyConfig;

/// Cap on captured output per stream.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long a terminated process may take to exit before it is abandoned.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The process exited on its own (`None` when killed by a signal).
    Exited(Option<i32>),
    /// A newer run, or an explicit supersede, terminated the process.
    Superseded,
    /// The process could not be started.
    SpawnFailed(String),
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// `> executable args...`, as logged.
    pub command_line: String,
    pub working_dir: PathBuf,
    pub stdout: String,
    pub stderr: String,
    pub status: RunStatus,
    /// True if either stream hit [`MAX_OUTPUT_BYTES`].
    pub truncated: bool,
}

impl RunOutput {
    fn spawn_failed(command_line: String, working_dir: &Path, err: &TidyError) -> Self {
        Self {
            command_line,
            working_dir: working_dir.to_path_buf(),
            stdout: String::new(),
            stderr: String::new(),
            status: RunStatus::SpawnFailed(err.to_string()),
            truncated: false,
        }
    }

    pub fn superseded(&self) -> bool {
        self.status == RunStatus::Superseded
    }
}

struct RunHandle {
    id: u64,
    kill: oneshot::Sender<()>,
}

/// Single-flight clang-tidy launcher.
#[derive(Default)]
pub struct TidyRunner {
    current: Mutex<Option<RunHandle>>,
    next_id: AtomicU64,
}

impl TidyRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a run is in flight.
    pub fn is_running(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Terminates the in-flight run, if any. Does nothing otherwise.
    pub fn supersede(&self) {
        if let Some(handle) = self.current.lock().take() {
            debug!("Superseding clang-tidy run {}", handle.id);
            // The receiver is gone if the run finished in the meantime.
            let _ = handle.kill.send(());
        }
    }

    /// Analyzes `files` with `config`, optionally applying fixes on disk.
    pub async fn run(&self, config: &TidyConfig, files: &[PathBuf], cwd: &Path, fix: bool) -> RunOutput {
        let args = config.arguments(files, fix);
        self.run_command(&config.executable, &args, cwd).await
    }

    /// Runs `executable` with `args` in `cwd`, superseding any in-flight run.
    ///
    /// Failures never surface as errors: a process that cannot be started or
    /// exits non-zero still yields whatever output it produced.
    pub async fn run_command(&self, executable: &str, args: &[String], cwd: &Path) -> RunOutput {
        self.supersede();

        let command_line = format!("> {} {}", executable, args.join(" "));
        info!("{}", command_line);
        info!("Working Directory: {}", cwd.display());

        let mut cmd = Command::new(executable);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = TidyError::Spawn {
                    executable: executable.to_string(),
                    source,
                };
                warn!("{}", err);
                return RunOutput::spawn_failed(command_line, cwd, &err);
            }
        };

        let stdout_task = match child.stdout.take() {
            Some(stdout) => tokio::spawn(read_to_end_limited(stdout, MAX_OUTPUT_BYTES)),
            None => tokio::spawn(async { (Vec::new(), false) }),
        };
        let stderr_task = match child.stderr.take() {
            Some(stderr) => tokio::spawn(read_to_end_limited(stderr, MAX_OUTPUT_BYTES)),
            None => tokio::spawn(async { (Vec::new(), false) }),
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *self.current.lock() = Some(RunHandle { id, kill: kill_tx });

        let waited = tokio::select! {
            res = child.wait() => Some(res),
            _ = kill_rx => None,
        };

        let status = match waited {
            Some(Ok(status)) => RunStatus::Exited(status.code()),
            Some(Err(e)) => {
                warn!("Failed to wait for clang-tidy: {}", e);
                RunStatus::Exited(None)
            }
            None => {
                terminate(&mut child).await;
                RunStatus::Superseded
            }
        };

        {
            let mut current = self.current.lock();
            if current.as_ref().is_some_and(|h| h.id == id) {
                *current = None;
            }
        }

        if status == RunStatus::Superseded {
            // Orphaned grandchildren may keep the pipes open.
            stdout_task.abort();
            stderr_task.abort();
        }

        let (stdout_bytes, stdout_truncated) = stdout_task.await.unwrap_or_default();
        let (stderr_bytes, stderr_truncated) = stderr_task.await.unwrap_or_default();
        let stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();

        debug!("clang-tidy stdout:\n{}", stdout);
        if !stderr.is_empty() {
            info!("{}", stderr.trim_end());
        }
        match &status {
            RunStatus::Exited(Some(0)) => {}
            RunStatus::Exited(code) => info!("clang-tidy exited with {:?}", code),
            RunStatus::Superseded => info!("clang-tidy run {} was superseded", id),
            RunStatus::SpawnFailed(_) => {}
        }
        if stdout_truncated || stderr_truncated {
            warn!("clang-tidy output exceeded {} bytes and was truncated", MAX_OUTPUT_BYTES);
        }

        RunOutput {
            command_line,
            working_dir: cwd.to_path_buf(),
            stdout,
            stderr,
            status,
            truncated: stdout_truncated || stderr_truncated,
        }
    }
}

#[cfg(windows)]
async fn terminate(child: &mut Child) {
    // Kill the whole tree; clang-tidy may have spawned helpers.
    if let Some(pid) = child.id() {
        let result = Command::new("taskkill")
            .args(["/pid", &pid.to_string(), "/f", "/t"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            warn!("taskkill failed for pid {}: {}", pid, e);
            let _ = child.start_kill();
        }
    }
    let _ = time::timeout(TERMINATE_GRACE, child.wait()).await;
}

#[cfg(not(windows))]
async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("Failed to kill clang-tidy: {}", e);
    }
    if time::timeout(TERMINATE_GRACE, child.wait()).await.is_err() {
        warn!("clang-tidy did not exit after being killed");
    }
}

async fn read_to_end_limited<R>(mut reader: R, max_bytes: usize) -> (Vec<u8>, bool)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = match reader.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let remaining = max_bytes.saturating_sub(buf.len());
        if remaining == 0 {
            truncated = true;
            continue;
        }
        let take = remaining.min(n);
        buf.extend_from_slice(&tmp[..take]);
        if take < n {
            truncated = true;
        }
    }

    (buf, truncated)
}
