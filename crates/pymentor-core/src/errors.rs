//! Error types for the mentor pipeline and the execution engine
//!
//! Two hierarchies live here. `MentorError` covers the conversational side
//! (LLM calls, configuration, retrieval, sessions) and is what callers of the
//! agent see. `ExecutorError` is internal to the process executor: it never
//! crosses the `CodeExecutor` trait, where every variant is folded into a
//! failed `ExecutionResult`.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MentorError {
    #[error("LLM interaction failed: {0}")]
    LLMError(String),
    #[error("Code execution failed: {0}")]
    CodeExecutionError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Retrieval failed: {0}")]
    RetrievalError(String),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for MentorError {
    fn from(err: std::io::Error) -> Self {
        MentorError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for MentorError {
    fn from(err: reqwest::Error) -> Self {
        MentorError::LLMError(err.to_string())
    }
}

// Failures inside the process executor, before or while the child runs
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Could not prepare execution directory {path}: {source}")]
    ExecutionDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not create temporary file: {0}")]
    TempFile(#[source] std::io::Error),
    #[error("Failed to launch interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error during execution: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed waiting for child process: {0}")]
    Wait(String),
    #[error("Invalid execution timeout: {0} seconds")]
    InvalidTimeout(f64),
}
