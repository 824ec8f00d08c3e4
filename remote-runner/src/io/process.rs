//! Child process invocation shared by the sync, script, and fallback stages.
//!
//! Children inherit stdin and stdout. Stderr is forwarded line by line to our
//! own stderr while a bounded copy is kept, so a failed child can be reported
//! with its diagnostic text.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Default bound on captured stderr per child.
pub const DEFAULT_DIAGNOSTIC_LIMIT_BYTES: usize = 64 * 1024;

/// How long to keep reading stderr after a timed child has exited or been
/// killed. Descendants that inherited the pipe can hold it open indefinitely.
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(500);

type StderrCapture = Result<(Vec<u8>, usize)>;

/// One external command to run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<OsString>,
    /// Working directory of the child. The parent's directory is never changed.
    pub workdir: PathBuf,
    /// Kill the child after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Keep at most this many bytes of stderr.
    pub diagnostic_limit_bytes: usize,
}

impl ProcessRequest {
    pub fn new(program: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: workdir.into(),
            timeout: None,
            diagnostic_limit_bytes: DEFAULT_DIAGNOSTIC_LIMIT_BYTES,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn diagnostic_limit(mut self, bytes: usize) -> Self {
        self.diagnostic_limit_bytes = bytes;
        self
    }

    /// Program and arguments joined by spaces, for log and error messages.
    ///
    /// Arguments that are not valid Unicode are shown lossily; the child still
    /// receives them unchanged.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// Exit information and captured stderr of a finished child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, `None` when the child was ended by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub stderr: Vec<u8>,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl ProcessOutcome {
    /// A clean exit with code 0 and no diagnostics.
    pub fn succeeded() -> Self {
        Self {
            code: Some(0),
            success: true,
            stderr: Vec::new(),
            stderr_truncated: 0,
            timed_out: false,
        }
    }

    /// An exit with `code` and the given stderr text.
    pub fn exited(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            success: code == 0,
            stderr: stderr.as_bytes().to_vec(),
            stderr_truncated: 0,
            timed_out: false,
        }
    }

    fn from_status(status: ExitStatus, stderr: Vec<u8>, truncated: usize, timed_out: bool) -> Self {
        Self {
            code: status.code(),
            success: status.success() && !timed_out,
            stderr,
            stderr_truncated: truncated,
            timed_out,
        }
    }

    /// Trimmed stderr text, or `None` if the child wrote nothing useful.
    pub fn diagnostic(&self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.stderr);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.stderr_truncated > 0 {
            return Some(format!(
                "{text}\n[stderr truncated {} bytes]",
                self.stderr_truncated
            ));
        }
        Some(text.to_string())
    }
}

/// A child process that did not exit successfully.
///
/// Carried inside `anyhow::Error`; callers tell handled command failures apart
/// from unexpected errors with `downcast_ref::<CommandFailed>()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command `{command}` {}", status_phrase(.code, .timed_out))]
pub struct CommandFailed {
    pub command: String,
    pub code: Option<i32>,
    pub timed_out: bool,
    pub diagnostic: Option<String>,
}

impl CommandFailed {
    pub fn new(request: &ProcessRequest, outcome: &ProcessOutcome) -> Self {
        Self {
            command: request.command_line(),
            code: outcome.code,
            timed_out: outcome.timed_out,
            diagnostic: outcome.diagnostic(),
        }
    }
}

fn status_phrase(code: &Option<i32>, timed_out: &bool) -> String {
    match (code, timed_out) {
        (_, true) => "timed out and was killed".to_string(),
        (Some(code), false) => format!("returned non-zero exit status {code}"),
        (None, false) => "was terminated by a signal".to_string(),
    }
}

/// Abstraction over spawning a child and waiting for it.
pub trait ProcessRunner {
    /// Run the request to completion. `Err` means the child could not be run at
    /// all; a non-zero exit is reported through [`ProcessOutcome::success`].
    fn run(&self, request: &ProcessRequest) -> Result<ProcessOutcome>;
}

/// Run `request` and turn a non-zero exit into a [`CommandFailed`] error.
pub fn run_checked<R: ProcessRunner + ?Sized>(
    runner: &R,
    request: &ProcessRequest,
) -> Result<ProcessOutcome> {
    let outcome = runner.run(request)?;
    if !outcome.success {
        return Err(CommandFailed::new(request, &outcome).into());
    }
    Ok(outcome)
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    #[instrument(level = "debug", skip_all, fields(program = %request.program, timeout_secs = request.timeout.map(|t| t.as_secs())))]
    fn run(&self, request: &ProcessRequest) -> Result<ProcessOutcome> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .current_dir(&request.workdir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());

        debug!(command = %request.command_line(), workdir = %request.workdir.display(), "spawning child process");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, command = %request.command_line(), "failed to spawn command");
                return Err(e).with_context(|| {
                    format!(
                        "spawn `{}` in {}",
                        request.command_line(),
                        request.workdir.display()
                    )
                });
            }
        };

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;
        let limit = request.diagnostic_limit_bytes;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver is gone only if we stopped waiting; nothing to report then.
            let _ = tx.send(tee_stream_limited(stderr, limit, std::io::stderr()));
        });

        let (status, timed_out) = wait_child(&mut child, request.timeout)?;

        let grace = request.timeout.map(|_| STDERR_DRAIN_GRACE);
        let (captured, truncated) = collect_stderr(&rx, grace)?;
        if truncated > 0 {
            warn!(truncated, "stderr capture truncated");
        }

        debug!(exit_code = ?status.code(), timed_out, "command finished");
        Ok(ProcessOutcome::from_status(
            status, captured, truncated, timed_out,
        ))
    }
}

/// Wait for the stderr reader. With `grace` set, give up after that long and
/// report an empty capture, leaving the reader detached.
fn collect_stderr(rx: &Receiver<StderrCapture>, grace: Option<Duration>) -> StderrCapture {
    let received = match grace {
        None => rx
            .recv()
            .map_err(|_| anyhow!("stderr reader thread panicked"))?,
        Some(grace) => match rx.recv_timeout(grace) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("stderr still held open by a descendant process, not waiting for it");
                return Ok((Vec::new(), 0));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("stderr reader thread panicked"));
            }
        },
    };
    received.context("read stderr")
}

fn wait_child(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        return Ok((child.wait().context("wait for command")?, false));
    };
    match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => Ok((status, false)),
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            child.kill().context("kill command")?;
            Ok((child.wait().context("wait command after kill")?, true))
        }
    }
}

/// Copy `reader` to `sink` line by line, keeping at most `limit` bytes.
///
/// Returns the kept bytes and the count of bytes dropped past the limit. Sink
/// write errors are logged and otherwise ignored so the pipe keeps draining.
fn tee_stream_limited<R: Read, W: Write>(
    reader: R,
    limit: usize,
    mut sink: W,
) -> Result<(Vec<u8>, usize)> {
    let mut buf_reader = BufReader::new(reader);
    let mut collected = Vec::new();
    let mut truncated = 0usize;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }

        if let Err(e) = sink.write_all(&line).and_then(|()| sink.flush()) {
            warn!(err = %e, "failed to forward child stderr");
        }

        let remaining = limit.saturating_sub(collected.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            collected.extend_from_slice(&line[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((collected, truncated))
}
