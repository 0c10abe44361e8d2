use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::{ScriptExecutor, ScriptOutcome};
use crate::types::{AppError, Result};
use crate::utils::toml_config::ExecutionConfig;

pub const DEFAULT_INTERPRETER: &str = "python3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 50_000;

/// How long to wait for the pipes to drain after a timed-out script is killed.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Runs scripts with a Python interpreter, one process per script.
///
/// The source is piped to `<interpreter> -I -u -` so nothing touches disk,
/// user site-packages and `PYTHON*` variables are ignored, and output written
/// before a timeout is not lost in a buffer.
#[derive(Debug, Clone)]
pub struct PythonExecutor {
    interpreter: String,
    timeout_secs: u64,
    max_output_bytes: usize,
}

impl Default for PythonExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPRETER)
    }
}

impl PythonExecutor {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.interpreter.clone())
            .with_timeout_secs(config.timeout_secs)
            .with_max_output_bytes(config.max_output_bytes)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn truncate(&self, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        if text.len() <= self.max_output_bytes {
            return text.into_owned();
        }

        let mut end = self.max_output_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated, {} bytes total]", &text[..end], text.len())
    }
}

#[async_trait]
impl ScriptExecutor for PythonExecutor {
    async fn execute(&self, source: &str) -> Result<ScriptOutcome> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-I")
            .arg("-u")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AppError::Execution(format!(
                "Failed to start interpreter '{}': {}",
                self.interpreter, e
            ))
        })?;

        let stdout_reader = child.stdout.take().map(|pipe| tokio::spawn(read_pipe(pipe)));
        let stderr_reader = child.stderr.take().map(|pipe| tokio::spawn(read_pipe(pipe)));

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .await
                .map_err(|e| AppError::Execution(format!("Failed to send script: {}", e)))?;
        }

        debug!(interpreter = %self.interpreter, timeout_secs = self.timeout_secs, "Script started");

        let result = timeout(Duration::from_secs(self.timeout_secs), child.wait()).await;

        match result {
            Ok(Ok(status)) => {
                let stdout = self.truncate(&collect(stdout_reader).await);
                if status.success() {
                    Ok(ScriptOutcome::Completed { stdout })
                } else {
                    Ok(ScriptOutcome::Failed {
                        stdout,
                        stderr: self.truncate(&collect(stderr_reader).await),
                        exit_code: status.code(),
                    })
                }
            }
            Ok(Err(e)) => Err(AppError::Execution(format!(
                "Failed to wait for script: {}",
                e
            ))),
            Err(_) => {
                warn!(timeout_secs = self.timeout_secs, "Script timed out");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to stop timed-out script");
                }
                // A process the script started may still hold the pipe open.
                let captured = timeout(PIPE_DRAIN_GRACE, collect(stdout_reader))
                    .await
                    .unwrap_or_default();
                Ok(ScriptOutcome::TimedOut {
                    stdout: self.truncate(&captured),
                    timeout_secs: self.timeout_secs,
                })
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(mut pipe: R) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        debug!(error = %e, "Script pipe closed with an error");
    }
    buf
}

async fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    match reader {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    }
}
