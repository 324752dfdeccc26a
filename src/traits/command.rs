use crate::error::ExecutionError;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Shared cancellation flag for in-flight tool invocations.
///
/// Cloning shares the flag; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Running children are killed at the next poll.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One external tool call
#[derive(Debug, Clone)]
pub struct Invocation {
    pub binary: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Overrides layered on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Kill the child once this elapses; `None` waits indefinitely
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl Invocation {
    pub fn new(binary: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
            timeout: None,
            cancel: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel_token(mut self, token: Option<CancelToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Command line for logs and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.binary.clone()
        } else {
            format!("{} {}", self.binary, self.args.join(" "))
        }
    }
}

/// Captured result of a finished process, whatever its exit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Accept the output only if its exit code is in `accepted`.
    pub fn ensure_exit_code(self, accepted: &[i32]) -> Result<Self, ExecutionError> {
        match self.exit_code {
            Some(code) if accepted.contains(&code) => Ok(self),
            exit_code => Err(ExecutionError::NonZeroExit {
                command: self.command,
                exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            }),
        }
    }

    pub fn ensure_success(self) -> Result<Self, ExecutionError> {
        self.ensure_exit_code(&[0])
    }
}

/// Trait for executing system commands, allowing for mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run one process to completion and capture its output.
    ///
    /// Returns `Ok` for any exit status; callers decide which codes are fatal.
    /// Errors are reserved for a process that could not be started or supervised.
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecutionError>;
}

/// Real command executor using std::process::Command
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecutionError> {
        let command_line = invocation.display();
        check_working_dir(&invocation.working_dir)?;

        debug!(
            command = %command_line,
            working_dir = %invocation.working_dir.display(),
            "spawning process"
        );

        let child = Command::new(&invocation.binary)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&invocation.binary, &command_line, e))?;

        let mut guard = ChildGuard::new(child);
        let stdout_reader = guard.child.stdout.take().map(drain);
        let stderr_reader = guard.child.stderr.take().map(drain);

        let waited = wait_for_exit(&mut guard, invocation);
        drop(guard);

        let stdout = collect(&command_line, "stdout", stdout_reader, DRAIN_GRACE);
        let stderr = collect(&command_line, "stderr", stderr_reader, DRAIN_GRACE);

        match waited {
            Ok(Wait::Exited(status)) => {
                info!(command = %command_line, exit_code = ?status.code(), "process finished");
                Ok(CommandOutput {
                    command: command_line,
                    stdout,
                    stderr,
                    exit_code: status.code(),
                })
            }
            Ok(Wait::TimedOut(timeout)) => {
                warn!(command = %command_line, timeout_secs = timeout.as_secs(), "process timed out");
                Err(ExecutionError::TimedOut {
                    command: command_line,
                    timeout,
                    stdout,
                    stderr,
                })
            }
            Ok(Wait::Cancelled) => {
                warn!(command = %command_line, "process cancelled");
                Err(ExecutionError::Cancelled {
                    command: command_line,
                })
            }
            Err(source) => Err(ExecutionError::Io {
                command: command_line,
                source,
            }),
        }
    }
}

fn check_working_dir(path: &Path) -> Result<(), ExecutionError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ExecutionError::InvalidWorkingDir {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(ExecutionError::InvalidWorkingDir {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn spawn_error(binary: &str, command_line: &str, e: io::Error) -> ExecutionError {
    if e.kind() == io::ErrorKind::NotFound {
        ExecutionError::BinaryNotFound {
            binary: binary.to_string(),
        }
    } else {
        ExecutionError::Spawn {
            command: command_line.to_string(),
            source: e,
        }
    }
}

enum Wait {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
}

fn wait_for_exit(guard: &mut ChildGuard, invocation: &Invocation) -> io::Result<Wait> {
    let started = Instant::now();

    loop {
        if let Some(status) = guard.child.try_wait()? {
            guard.reaped = true;
            return Ok(Wait::Exited(status));
        }

        if invocation.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            guard.kill_and_reap()?;
            return Ok(Wait::Cancelled);
        }

        if let Some(timeout) = invocation.timeout {
            if started.elapsed() >= timeout {
                guard.kill_and_reap()?;
                return Ok(Wait::TimedOut(timeout));
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Output stream drained on its own thread so a chatty child never blocks on a full pipe.
struct StreamCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

fn drain<R: Read + Send + 'static>(mut stream: R) -> StreamCapture {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let (tx, done) = mpsc::channel();
    let sink = Arc::clone(&buf);

    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => lock_buf(&sink).extend_from_slice(&chunk[..n]),
            }
        }
        let _ = tx.send(());
    });

    StreamCapture { buf, done }
}

fn lock_buf(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Grandchildren (provider plugins) can keep a pipe open after the tool exits,
/// so collection waits at most `grace` before taking what was read.
fn collect(
    command_line: &str,
    stream: &str,
    capture: Option<StreamCapture>,
    grace: Duration,
) -> String {
    let Some(capture) = capture else {
        return String::new();
    };

    if let Err(RecvTimeoutError::Timeout) = capture.done.recv_timeout(grace) {
        warn!(
            command = %command_line,
            stream,
            grace_secs = grace.as_secs_f64(),
            "pipe still open after the process exited, captured output may be truncated"
        );
    }
    String::from_utf8_lossy(&lock_buf(&capture.buf)).into_owned()
}

/// Kills the child if supervision is abandoned before it was reaped.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn kill_and_reap(&mut self) -> io::Result<()> {
        // The child may exit between the last poll and the kill.
        if let Err(e) = self.child.kill() {
            if e.kind() != io::ErrorKind::InvalidInput {
                return Err(e);
            }
        }
        self.child.wait()?;
        self.reaped = true;
        Ok(())
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Mock command executor for testing
#[cfg(test)]
pub struct MockCommandExecutor {
    /// Pre-configured outputs, matched by subcommand (first argument)
    outputs: std::sync::Mutex<Vec<MockCommandResult>>,
    /// Every invocation seen, in order
    calls: std::sync::Mutex<Vec<Invocation>>,
}

#[cfg(test)]
#[derive(Clone, Debug)]
pub struct MockCommandResult {
    pub subcommand: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
impl MockCommandResult {
    pub fn ok(subcommand: &str, stdout: &str) -> Self {
        Self {
            subcommand: subcommand.to_string(),
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(subcommand: &str, exit_code: i32, stderr: &str) -> Self {
        Self {
            subcommand: subcommand.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self {
            outputs: std::sync::Mutex::new(Vec::new()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        Self {
            outputs: std::sync::Mutex::new(outputs),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| call.args.first().cloned())
            .collect()
    }
}

#[cfg(test)]
impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ExecutionError> {
        self.calls.lock().unwrap().push(invocation.clone());

        let subcommand = invocation.args.first().cloned().unwrap_or_default();
        let mut outputs = self.outputs.lock().unwrap();

        if let Some(index) = outputs.iter().position(|r| r.subcommand == subcommand) {
            let mock_result = outputs.remove(index);
            return Ok(CommandOutput {
                command: invocation.display(),
                stdout: mock_result.stdout,
                stderr: mock_result.stderr,
                exit_code: Some(mock_result.exit_code),
            });
        }

        // Default: successful empty output
        Ok(CommandOutput {
            command: invocation.display(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}
