//! Execution engine invocation.
//!
//! Runs `jupyter nbconvert --execute` (or a compatible program) against one
//! notebook. The engine runs with the notebook's directory as its working
//! directory; the harness's own working directory is never touched, so
//! invocations can run concurrently.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::artifact::{DEFAULT_OUTPUT_PREFIX, TempArtifact};
use crate::error::{Error, Result};

/// How often a running engine is checked for exit, deadline and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long to wait for the rest of stderr once the engine has exited.
const STDERR_GRACE: Duration = Duration::from_secs(2);

/// Default per-case deadline: one hour.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Handle for cooperative cancellation of running cases.
///
/// Clones share one flag; cancelling any clone is visible to all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, not yet cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Execution engine settings shared by all cases of a suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine executable.
    pub program: String,

    /// Leading arguments placed before the conversion options.
    pub args: Vec<String>,

    /// Kernel the notebooks run on.
    pub kernel: String,

    /// Default per-case deadline in seconds; 0 disables it.
    pub timeout_secs: u64,

    /// Prefix of temporary output documents.
    pub output_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "jupyter".to_string(),
            args: vec!["nbconvert".to_string()],
            kernel: "python".to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

impl EngineConfig {
    /// Default deadline as a duration, `None` if unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Build the engine command line for one notebook.
    ///
    /// The notebook is passed by file name and the command runs inside
    /// `artifact.dir()`, which is the notebook's directory. On Unix the
    /// engine leads a new process group so its kernel can be killed with it.
    pub fn command(&self, program: &Path, notebook: &Path, artifact: &TempArtifact) -> Command {
        let file_name = notebook.file_name().unwrap_or(notebook.as_os_str());

        let mut cmd = Command::new(program);
        cmd.args(&self.args)
            .args(["--to", "notebook", "--execute"])
            .arg(format!("--ExecutePreprocessor.kernel_name={}", self.kernel))
            .arg("--ExecutePreprocessor.timeout=None")
            .arg("--output")
            .arg(artifact.prefix())
            .arg("--output-dir")
            .arg(".")
            .arg(file_name)
            .current_dir(artifact.dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }

    /// Locate the engine executable.
    ///
    /// Names containing a path separator are made absolute against the
    /// harness's working directory (the engine itself runs elsewhere), bare
    /// names are looked up on `PATH`.
    pub fn resolve_program(&self) -> Result<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return std::path::absolute(program).map_err(|e| Error::Spawn {
                program: self.program.clone(),
                source: e,
            });
        }
        which::which(&self.program).map_err(|e| Error::Spawn {
            program: self.program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })
    }
}

/// Runs the engine for one notebook at a time.
pub struct Invoker {
    config: EngineConfig,
    cancel: CancelToken,
}

impl Invoker {
    /// Create an invoker with the given engine settings.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Share a cancellation token with this invoker.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute `notebook`, writing the engine's output to `artifact`.
    ///
    /// Blocks until the engine exits, `deadline` passes or the cancel token
    /// fires. In the latter two cases the engine is killed and reaped.
    pub fn invoke(
        &self,
        notebook: &Path,
        artifact: &TempArtifact,
        deadline: Option<Duration>,
    ) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                notebook: notebook.to_path_buf(),
            });
        }
        if !notebook.is_file() {
            return Err(Error::NotebookNotFound(notebook.to_path_buf()));
        }

        let program = self.config.resolve_program()?;
        let mut cmd = self.config.command(&program, notebook, artifact);

        tracing::debug!("Spawning {:?} in {}", cmd, artifact.dir().display());

        let mut child = cmd.spawn().map_err(|e| Error::Spawn {
            program: self.config.program.clone(),
            source: e,
        })?;

        // Drain stderr on a separate thread so a chatty engine cannot block
        // on a full pipe while we wait for it. Anything that inherited the
        // pipe and outlives the engine only delays us by STDERR_GRACE.
        let (stderr_tx, stderr_rx) = mpsc::channel();
        if let Some(mut stderr) = child.stderr.take() {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                let _ = stderr_tx.send(buf);
            });
        }

        let waited = self.wait(&mut child, deadline);
        let stderr = stderr_rx
            .recv_timeout(STDERR_GRACE)
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default();

        match waited? {
            Wait::Exited(status) if status.success() => Ok(()),
            Wait::Exited(status) => Err(Error::Invocation {
                notebook: notebook.to_path_buf(),
                exit_code: status.code(),
                stderr: stderr.trim().to_string(),
            }),
            Wait::TimedOut(after) => Err(Error::TimedOut {
                notebook: notebook.to_path_buf(),
                after,
            }),
            Wait::Cancelled => Err(Error::Cancelled {
                notebook: notebook.to_path_buf(),
            }),
        }
    }

    /// Poll the child until it exits or must be stopped.
    fn wait(&self, child: &mut Child, deadline: Option<Duration>) -> Result<Wait> {
        let start = Instant::now();

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Wait::Exited(status));
            }

            let stop = if self.cancel.is_cancelled() {
                Some(Wait::Cancelled)
            } else {
                deadline
                    .filter(|d| start.elapsed() >= *d)
                    .map(Wait::TimedOut)
            };

            if let Some(stop) = stop {
                tracing::warn!("Killing execution engine (pid {})", child.id());
                kill_engine(child);
                child.wait()?;
                return Ok(stop);
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Kill the engine together with everything it started.
///
/// Must run before the child is reaped: until then its pid, and with it the
/// process group id, cannot be reused.
#[cfg(unix)]
fn kill_engine(child: &mut Child) {
    // SIGKILL for immediate termination
    unsafe {
        libc::killpg(child.id() as libc::pid_t, libc::SIGKILL);
    }
    // The child may have exited between try_wait and kill.
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_engine(child: &mut Child) {
    let _ = child.kill();
}

enum Wait {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
}
