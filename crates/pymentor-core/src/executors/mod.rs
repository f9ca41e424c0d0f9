//! Code execution for submitted Python snippets.
//!
//! Two executors implement the same trait. `ProcessCodeExecutor` runs code as
//! a child process in its own process group with a wall-clock budget; it backs
//! the sandbox service and the server's local mode. `RemoteCodeExecutor` calls
//! the sandbox service over HTTP. Both always hand back a well-formed
//! `ExecutionResult`: every failure, whether the code raised, timed out, could
//! not be launched or the service was unreachable, comes back as
//! `success == false` with a populated `error`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod process;
pub mod process_group;
pub mod remote;

pub use process::ProcessCodeExecutor;
pub use remote::RemoteCodeExecutor;

pub const DEFAULT_TIMEOUT_SECONDS: f64 = 5.0;

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Body of `POST /execute`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRequest {
    pub code: String,
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timeout: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Outcome of one execution attempt, as returned by `POST /execute`.
///
/// `success` implies `error` is `None`; a failure always carries an empty
/// `output` and a non-empty `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub output: String,
    pub success: bool,
    pub error: Option<String>,
    pub execution_time: f64,
}

impl ExecutionResult {
    pub fn succeeded(output: impl Into<String>, execution_time: f64) -> Self {
        Self {
            output: output.into(),
            success: true,
            error: None,
            execution_time,
        }
    }

    pub fn failed(error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            output: String::new(),
            success: false,
            error: Some(error.into()),
            execution_time,
        }
    }

    pub fn timed_out(timeout: f64) -> Self {
        Self::failed(
            format!("Execution timed out after {} seconds", format_seconds(timeout)),
            timeout,
        )
    }

    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self::failed(message, 0.0)
    }

    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}

/// Renders whole-second budgets without a trailing `.0`, so a 5 second timeout
/// reads "5 seconds" the way callers pass it.
pub fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 && seconds.abs() < 1e15 {
        format!("{}", seconds as i64)
    } else {
        format!("{}", seconds)
    }
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Runs `code` with a wall-clock budget of `timeout` seconds. Never fails;
    /// every error path is reported inside the returned result.
    async fn execute(&self, code: &str, timeout: f64) -> ExecutionResult;

    fn name(&self) -> &str;
}
