//! Build command execution with a deadline.
//!
//! The script runs in its own process group. When the script exits, or
//! its deadline fires, whatever is left of the group is killed so helpers
//! started in the background do not outlive the build.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use verdict_state::Verdict;

use crate::command::BuildCommand;
use crate::error::{BuildError, Result};

/// How long to wait for the output pipe to drain after a kill.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 8192;

/// Result of one build command run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit code, `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,

    /// Combined stdout and stderr.
    pub output: Vec<u8>,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the deadline expired.
    pub timed_out: bool,
}

impl RunOutput {
    /// Whether this run passed (exit code 0 within the deadline).
    pub fn passed(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn verdict(&self) -> Verdict {
        if self.passed() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Runs [`BuildCommand`]s.
pub struct BuildRunner;

impl BuildRunner {
    /// Run `cmd` to completion or until its deadline.
    ///
    /// Returns [`BuildError::Spawn`] when the shell cannot be started. A
    /// timeout is not an error: the output is returned with `timed_out` set.
    pub async fn run(cmd: &BuildCommand) -> Result<RunOutput> {
        let start = Instant::now();

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(cmd.shell_body())
            .current_dir(cmd.work_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(BuildError::Spawn)?;
        let pid = child.id();

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| BuildError::Io(io::Error::new(io::ErrorKind::Other, "stdout not captured")))?;
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let mut reader = tokio::spawn(async move {
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                let n = stdout.read(&mut chunk).await?;
                if n == 0 {
                    return Ok::<(), io::Error>(());
                }
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]);
            }
        });

        let (status, timed_out) = match cmd.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => (Some(status?), false),
                Err(_) => {
                    warn!(pid = ?pid, timeout_secs = limit.as_secs(), "build deadline expired, killing process group");
                    (terminate(&mut child, pid).await, true)
                }
            },
            None => (Some(child.wait().await?), false),
        };

        // Stragglers left in the group would hold the output pipe open.
        if let Some(pid) = pid {
            kill_group(pid).await;
        }
        // A helper that left the group can still hold the pipe; keep what
        // was read and stop waiting for the rest.
        match tokio::time::timeout(DRAIN_GRACE, &mut reader).await {
            Ok(joined) => joined.map_err(join_error)??,
            Err(_) => {
                warn!(pid = ?pid, "output pipe still held open, keeping output read so far");
                reader.abort();
            }
        }
        let output = std::mem::take(&mut *captured.lock().unwrap_or_else(PoisonError::into_inner));

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.and_then(|s| s.code());
        debug!(pid = ?pid, exit_code = ?exit_code, duration_ms, timed_out, "build command exited");

        Ok(RunOutput {
            exit_code,
            output,
            duration_ms,
            timed_out,
        })
    }
}

fn join_error(e: tokio::task::JoinError) -> BuildError {
    BuildError::Io(io::Error::new(io::ErrorKind::Other, e))
}

/// Kill the child's process group, then the child itself, and reap it.
async fn terminate(child: &mut Child, pid: Option<u32>) -> Option<ExitStatus> {
    if let Some(pid) = pid {
        kill_group(pid).await;
    }
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "child already gone");
    }
    child.wait().await.ok()
}

#[cfg(unix)]
async fn kill_group(pid: u32) {
    let result = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pid}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if status.success() => {}
        Ok(status) => debug!(pid, ?status, "no process group left to kill"),
        Err(e) => warn!(pid, error = %e, "could not signal process group"),
    }
}

#[cfg(not(unix))]
async fn kill_group(_pid: u32) {}
