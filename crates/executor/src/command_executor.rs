use crate::command_guard::CommandGuard;
use crate::error::SandboxError;
use crate::resolve::resolve_executable;
use crate::ring_buffer::{RingBuffer, OUTPUT_LIMIT};
use parking_lot::Mutex;
use serde::Serialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(120);
const TERMINATE_GRACE: Duration = Duration::from_secs(2);
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalRequest {
    pub executable: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminalOutput {
    pub executable: PathBuf,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    pub output_limit: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            max_timeout: MAX_TIMEOUT,
            output_limit: OUTPUT_LIMIT,
        }
    }
}

/// Policy-gated, timeout-bounded subprocess runner.
pub struct CommandExecutor {
    limits: SandboxLimits,
    path_var: Option<OsString>,
}

impl CommandExecutor {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            limits,
            path_var: std::env::var_os("PATH"),
        }
    }

    /// Override the PATH used for bare-name resolution.
    pub fn with_path(mut self, path_var: OsString) -> Self {
        self.path_var = Some(path_var);
        self
    }

    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .filter(|t| !t.is_zero())
            .unwrap_or(self.limits.default_timeout)
            .min(self.limits.max_timeout)
    }

    pub async fn execute(&self, request: &TerminalRequest) -> Result<TerminalOutput, SandboxError> {
        if request.executable.trim().is_empty() {
            return Err(SandboxError::InvalidRequest("executable is empty".into()));
        }

        CommandGuard::validate(&request.executable, &request.args)?;
        let path = resolve_executable(&request.executable, self.path_var.as_deref())?;
        let timeout = self.effective_timeout(request.timeout);

        info!(
            "Executing command: {} {:?} (timeout {:?})",
            path.display(),
            request.args,
            timeout
        );

        let mut cmd = Command::new(&path);
        cmd.args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxError::SpawnFailed(e.to_string()))?;

        let limit = self.limits.output_limit;
        let stdout_task = child.stdout.take().map(|pipe| spawn_drain(pipe, limit));
        let stderr_task = child.stderr.take().map(|pipe| spawn_drain(pipe, limit));

        let (status, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => (status.ok(), false),
            Err(_) => {
                warn!("Command timed out after {:?}: {}", timeout, path.display());
                (terminate(&mut child).await, true)
            }
        };

        let (stdout, stdout_truncated) = collect_drain(stdout_task).await;
        let (stderr, stderr_truncated) = collect_drain(stderr_task).await;
        let exit_code = status.and_then(|s| s.code());

        debug!(
            "Command finished: exit={:?} timed_out={} stdout={}B stderr={}B",
            exit_code,
            timed_out,
            stdout.len(),
            stderr.len()
        );

        Ok(TerminalOutput {
            executable: path,
            exit_code,
            timed_out,
            stdout,
            stderr,
            truncated: stdout_truncated || stderr_truncated,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(SandboxLimits::default())
    }
}

/// A pipe reader filling a shared ring buffer.
struct Drain {
    task: JoinHandle<()>,
    ring: Arc<Mutex<RingBuffer>>,
}

fn spawn_drain<R>(mut pipe: R, limit: usize) -> Drain
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let ring = Arc::new(Mutex::new(RingBuffer::new(limit)));
    let sink = Arc::clone(&ring);
    let task = tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.lock().push(&chunk[..n]),
                Err(e) => {
                    debug!("Pipe read failed: {}", e);
                    break;
                }
            }
        }
    });
    Drain { task, ring }
}

/// Wait for a drain task; grandchildren holding the pipe open must not block
/// the result. On expiry the bytes read so far are kept and marked truncated.
async fn collect_drain(drain: Option<Drain>) -> (String, bool) {
    let Some(mut drain) = drain else {
        return (String::new(), false);
    };
    match tokio::time::timeout(DRAIN_GRACE, &mut drain.task).await {
        Ok(Ok(())) => drain.ring.lock().contents(),
        Ok(Err(e)) => {
            warn!("Output drain task failed: {}", e);
            let (text, _) = drain.ring.lock().contents();
            (text, true)
        }
        Err(_) => {
            drain.task.abort();
            warn!("Output pipe still open after {:?}, keeping partial output", DRAIN_GRACE);
            let (text, _) = drain.ring.lock().contents();
            (text, true)
        }
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) {
    if let Some(pid) = child.id() {
        // process_group(0) made the child its own group leader
        unsafe {
            libc::kill(-(pid as libc::pid_t), signal);
        }
    }
}

/// Graceful terminate, grace window, then force-kill.
async fn terminate(child: &mut Child) -> Option<ExitStatus> {
    #[cfg(unix)]
    signal_group(child, libc::SIGTERM);
    #[cfg(not(unix))]
    let _ = child.start_kill();

    if let Ok(status) = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        return status.ok();
    }

    warn!("Command ignored SIGTERM, killing");
    #[cfg(unix)]
    signal_group(child, libc::SIGKILL);
    let _ = child.start_kill();
    child.wait().await.ok()
}
