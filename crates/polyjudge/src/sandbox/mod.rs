//! Sandboxed execution of bundled scripts
//!
//! Each run gets its own `node` worker process that evaluates the code in a
//! fresh `vm` context and reports console output over a line-based JSON
//! protocol on stdout. The host enforces the wall clock limit and kills the
//! worker as soon as the run settles, whichever way it settles.
//!
//! Isolation is best effort: the worker is a separate process with its own
//! globals, but it runs with the permissions of the host user.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tracing::{debug, instrument, warn};

use crate::config::SandboxConfig;
use crate::sandbox::protocol::{Settlement, drive};
pub use crate::sandbox::protocol::{HostMessage, WorkerMessage};
use crate::types::{ExecutionResult, LogBuffer, LogEntry, RunEvent, RunObserver};

mod protocol;
pub mod render;

/// Worker script passed to `node -e`
pub const BOOTSTRAP_SCRIPT: &str = include_str!("bootstrap.js");

/// Errors that occur while starting a worker
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to spawn worker '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {0} is not connected")]
    MissingPipe(&'static str),

    #[error("failed to send code to worker: {0}")]
    Dispatch(#[source] std::io::Error),

    #[error("failed to encode execute message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Handle that stops a running execution
///
/// Firing it before the execution starts waiting still stops it.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(Arc<Notify>);

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the execution this switch belongs to
    pub fn kill(&self) {
        self.0.notify_one();
    }

    /// Whether both handles control the same execution
    pub(crate) fn same_as(&self, other: &KillSwitch) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Options for a single execution
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Strip TypeScript types in the worker before running
    pub typescript: bool,
    /// Wrap the code in an HTML document instead of running it
    pub render: bool,
}

/// Runs scripts in `node` worker processes
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    config: SandboxConfig,
    cdn_base: String,
}

impl SandboxExecutor {
    /// Create an executor; `cdn_base` hosts the in-page compiler for render mode
    pub fn new(config: SandboxConfig, cdn_base: impl Into<String>) -> Self {
        Self {
            config,
            cdn_base: cdn_base.into(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Execute standalone code with no way to cancel it
    ///
    /// Render mode is picked by scanning `code` itself, so it suits
    /// unbundled user code only.
    pub async fn execute(&self, code: &str, observer: &dyn RunObserver) -> ExecutionResult {
        let options = ExecuteOptions {
            render: render::needs_dom(code),
            ..ExecuteOptions::default()
        };
        self.execute_with(code, options, &KillSwitch::new(), observer)
            .await
    }

    /// Execute code, streaming console output to `observer`
    ///
    /// In render mode the code is not executed; a single render event
    /// carrying an HTML document is emitted instead.
    #[instrument(skip_all, fields(code_len = code.len()))]
    pub async fn execute_with(
        &self,
        code: &str,
        options: ExecuteOptions,
        kill: &KillSwitch,
        observer: &dyn RunObserver,
    ) -> ExecutionResult {
        if options.render {
            debug!("code needs a DOM, rendering instead of executing");
            observer.on_event(RunEvent::Render(render::document(code, &self.cdn_base)));
            return ExecutionResult::default();
        }

        let started = Instant::now();
        let mut worker = match self.spawn_worker() {
            Ok(worker) => worker,
            Err(e) => return fail(observer, e.to_string(), started),
        };

        let result = match self.run(&mut worker, code, options, kill, observer).await {
            Ok(result) => result,
            Err(e) => fail(observer, e.to_string(), started),
        };

        // The run has settled; nothing the worker does from here matters
        if let Ok(None) = worker.try_wait()
            && let Err(e) = worker.kill().await
        {
            warn!(error = %e, "failed to kill worker");
        }
        result
    }

    fn spawn_worker(&self) -> Result<Child, SandboxError> {
        let program = &self.config.node_path;
        debug!(node = %program.display(), "spawning worker");
        Command::new(program)
            .args(&self.config.node_args)
            .arg("-e")
            .arg(BOOTSTRAP_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::SpawnFailed {
                program: program.display().to_string(),
                source,
            })
    }

    async fn run(
        &self,
        worker: &mut Child,
        code: &str,
        options: ExecuteOptions,
        kill: &KillSwitch,
        observer: &dyn RunObserver,
    ) -> Result<ExecutionResult, SandboxError> {
        let stdout = worker.stdout.take().ok_or(SandboxError::MissingPipe("stdout"))?;
        let stderr = worker.stderr.take().ok_or(SandboxError::MissingPipe("stderr"))?;
        let mut stdin = worker.stdin.take().ok_or(SandboxError::MissingPipe("stdin"))?;

        let message = HostMessage::Execute {
            code,
            typescript: options.typescript,
        }
        .to_line()?;
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(SandboxError::Dispatch)?;
        stdin.flush().await.map_err(SandboxError::Dispatch)?;
        drop(stdin);

        // Measured from dispatch
        let dispatched = Instant::now();
        let timeout = self.timeout();
        let mut buffer = LogBuffer::default();
        let settlement = drive(
            BufReader::new(stdout),
            BufReader::new(stderr),
            timeout,
            &kill.0,
            observer,
            &mut buffer,
        )
        .await;
        let elapsed = elapsed_ms(dispatched);

        let result = match settlement {
            Settlement::Done { duration_ms, error } => {
                debug!(duration_ms, error = ?error, "worker finished");
                buffer.into_result(duration_ms, error)
            }
            Settlement::Timeout => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms, "worker timed out");
                let entry = LogEntry::error(format!("Execution timed out after {timeout_ms} ms"));
                buffer.push(&entry);
                observer.on_log(entry);
                buffer.into_result(timeout_ms, Some(ExecutionResult::TIMEOUT.to_owned()))
            }
            Settlement::Cancelled => {
                debug!("execution cancelled");
                buffer.into_result(elapsed, Some(ExecutionResult::CANCELLED.to_owned()))
            }
            Settlement::Exited => {
                let status = worker.wait().await.ok();
                let message = match status.and_then(|s| s.code()) {
                    Some(code) => format!("Worker exited with code {code}"),
                    None => "Worker exited unexpectedly".to_owned(),
                };
                warn!(%message, "worker exited before finishing");
                let entry = LogEntry::error(message.clone());
                buffer.push(&entry);
                observer.on_log(entry);
                buffer.into_result(elapsed, Some(message))
            }
        };
        Ok(result)
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn fail(observer: &dyn RunObserver, message: String, started: Instant) -> ExecutionResult {
    warn!(%message, "sandbox failure");
    observer.on_log(LogEntry::error(message.clone()));
    ExecutionResult {
        stderr: vec![message.clone()],
        duration_ms: elapsed_ms(started),
        error: Some(message),
        ..Default::default()
    }
}
