//! Script Execution
//!
//! The `{python()}` template function hands extracted code to a
//! [`ScriptExecutor`]. The default implementation, [`PythonExecutor`], runs
//! each script in a fresh interpreter process.
//!
//! A script that fails, exits non-zero or runs out of time is still a
//! successful execution: the model gets to read what went wrong through
//! [`ScriptOutcome`]. `Err` is reserved for the executor itself breaking,
//! for example when the interpreter cannot be started.

/// Python interpreter subprocess executor.
pub mod python;

use async_trait::async_trait;

use crate::types::Result;

pub use python::PythonExecutor;

/// What happened when a script ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Exited with status zero.
    Completed { stdout: String },
    /// Exited with a non-zero status or was killed by a signal.
    Failed {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    /// Stopped after exceeding the time limit.
    TimedOut { stdout: String, timeout_secs: u64 },
}

impl ScriptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScriptOutcome::Completed { .. })
    }
}

/// Runs source code and reports its output.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Run `source` to completion.
    async fn execute(&self, source: &str) -> Result<ScriptOutcome>;
}
