//! Core library for the pymentor Python tutoring agent.
//!
//! The centre of the crate is the execution subsystem: `executors::process`
//! runs untrusted Python in its own process group under a wall-clock budget,
//! `executors::remote` reaches the same engine over HTTP, and `repair` layers
//! a single execute, fix and re-execute cycle on top. Around it sit the
//! pieces of the conversational agent:
//!
//! - **agent**: intent routing and the per-turn pipeline
//! - **llm**: OpenAI-protocol clients with bounded retries and a fallback
//! - **extraction**: finding code in chat messages and model replies
//! - **knowledge**: a small keyword retriever over configured notes
//! - **session** and **trace**: per-session records and JSONL turn traces
//! - **config**: YAML configuration for the server and environment
//!   configuration for the sandbox

pub mod agent;
pub mod config;
pub mod core_types;
pub mod errors;
pub mod executors;
pub mod extraction;
pub mod knowledge;
pub mod llm;
pub mod repair;
pub mod session;
pub mod trace;

pub use agent::{Intent, IntentRouter, MentorAgent};
pub use config::*;
pub use errors::{ExecutorError, MentorError};
pub use executors::{CodeExecutor, ExecutionRequest, ExecutionResult, ProcessCodeExecutor, RemoteCodeExecutor};
pub use llm::LLM;
pub use repair::{RepairAttempt, RepairLoop, RepairState};
pub use session::{Session, SessionStore};

#[cfg(test)]
pub mod test_utils;
