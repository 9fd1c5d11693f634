//! Execution of built programs under a wall-clock limit.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{trimmed_lossy, ExecutionResult};

/// Message reported as the program output when the run timeout expires.
pub const TIMEOUT_MESSAGE: &str = "Error: Program timed out.";

/// Line appended to a stream that hit the output limit.
pub const TRUNCATION_MARKER: &str = "[output truncated]";

/// Bytes kept per stream unless configured otherwise.
pub const DEFAULT_OUTPUT_LIMIT: usize = 64 * 1024;

/// How long to wait for the pipes to close once the program has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 8 * 1024;

/// Runs a built artifact with no arguments and a hard timeout.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    timeout: Duration,
    output_limit: usize,
}

impl ProcessRunner {
    /// Creates a runner that kills programs after `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Caps the bytes kept from each output stream.
    #[must_use]
    pub const fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    /// The run timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Bytes kept from each output stream.
    #[must_use]
    pub const fn output_limit(&self) -> usize {
        self.output_limit
    }

    /// Executes `artifact` and captures its result.
    ///
    /// Never fails: a launch failure or an expired timeout is folded into
    /// the returned [`ExecutionResult`]. The program runs in its own process
    /// group, and the whole group is killed once the program exits or the
    /// timeout expires, so background children cannot outlive the run.
    /// Output past the limit is drained and discarded.
    #[instrument(skip(self), fields(artifact = %artifact.display()))]
    pub async fn run(&self, artifact: &Path) -> ExecutionResult {
        let mut cmd = Command::new(artifact);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = artifact.parent() {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Failed to launch program");
                return ExecutionResult::launch_failure(&e);
            }
        };
        let pid = child.id();
        let stdout = tokio::spawn(read_capped(child.stdout.take(), self.output_limit));
        let stderr = tokio::spawn(read_capped(child.stderr.take(), self.output_limit));

        let outcome = tokio::time::timeout(self.timeout, child.wait()).await;
        kill_group(pid);

        let status = match outcome {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to wait for program");
                stdout.abort();
                stderr.abort();
                return ExecutionResult::launch_failure(&e);
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Program already gone at timeout");
                }
                stdout.abort();
                stderr.abort();
                info!(
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Program exceeded run timeout and was killed"
                );
                return ExecutionResult::timeout();
            }
        };

        let (stdout, stderr) = tokio::join!(collect(stdout), collect(stderr));
        let truncated = stdout.truncated || stderr.truncated;
        let (exit_code, termination) = describe_exit(status);
        let mut stderr = stderr.into_text();
        if let Some(termination) = termination {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&termination);
        }
        debug!(exit_code, truncated, "Program finished");

        ExecutionResult {
            exit_code,
            stdout: stdout.into_text(),
            stderr,
            timed_out: false,
            truncated,
        }
    }
}

/// Bytes kept from one output stream.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn into_text(self) -> String {
        let mut text = trimmed_lossy(&self.bytes);
        if self.truncated {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Reads `reader` to EOF, keeping at most `limit` bytes.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> Captured
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return captured;
    };

    let mut chunk = vec![0_u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.truncated = true;
                }
                captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading program output");
                break;
            }
        }
    }
    captured
}

/// Waits briefly for a reader; a pipe still held open after the group was
/// killed is abandoned.
async fn collect(mut reader: JoinHandle<Captured>) -> Captured {
    match tokio::time::timeout(DRAIN_GRACE, &mut reader).await {
        Ok(Ok(captured)) => captured,
        Ok(Err(e)) => {
            warn!(error = %e, "Output reader failed");
            Captured::default()
        }
        Err(_) => {
            reader.abort();
            debug!("Output pipe still open after exit, abandoning it");
            Captured::default()
        }
    }
}

/// Sends `SIGKILL` to the process group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "Killed program's process group"),
        // Nothing left in the group.
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "Failed to kill program's process group"),
    }
}

#[cfg(not(unix))]
const fn kill_group(_pid: Option<u32>) {}

/// Exit code for `status`, plus a description when a signal ended the process.
///
/// Signal terminations are reported shell-style as `128 + signal`.
fn describe_exit(status: ExitStatus) -> (i32, Option<String>) {
    if let Some(code) = status.code() {
        return (code, None);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            let description = format!(
                "Program terminated by signal {signal} ({})",
                signal_name(signal)
            );
            return (128 + signal, Some(description));
        }
    }

    (-1, None)
}

#[cfg(unix)]
fn signal_name(signal: i32) -> &'static str {
    nix::sys::signal::Signal::try_from(signal)
        .map_or("unknown signal", nix::sys::signal::Signal::as_str)
}
