//! Configuration type definitions
//!
//! `MentorConfig` is the YAML document consumed by the chat server. Every
//! section except `llm` is optional and falls back to the defaults the
//! original deployment used (five second executions, three LLM retries two
//! seconds apart, the `code-executor` service on port 8080).
//!
//! `SandboxConfig` describes the execution engine. The sandbox service builds
//! it from the environment; the chat server embeds it under `executor.local`
//! for the in-process mode.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::MentorError;
use crate::knowledge::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorConfig {
    #[serde(default)]
    pub agent: AgentSettings,
    pub llm: LlmConfig,
    #[serde(default)]
    pub fallback_llm: Option<LlmConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    /// dotenv-style files loaded into the process environment before API
    /// keys are resolved
    #[serde(default)]
    pub env_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_agent_temperature")]
    pub temperature: f32,
    #[serde(default = "default_code_timeout")]
    pub code_timeout_seconds: f64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            temperature: default_agent_temperature(),
            code_timeout_seconds: default_code_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub auth: LlmAuth,
}

/// LLM provider types. All of them speak the OpenAI chat completions protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Custom { base_url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            max_tokens: 0,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    #[default]
    Remote,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub mode: ExecutorMode,
    #[serde(default = "default_executor_url")]
    pub url: String,
    /// Extra transport time on top of the execution budget, so the HTTP call
    /// outlives the service's own timeout path.
    #[serde(default = "default_request_grace")]
    pub request_grace_seconds: f64,
    #[serde(default)]
    pub local: SandboxConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::default(),
            url: default_executor_url(),
            request_grace_seconds: default_request_grace(),
            local: SandboxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_execution_dir")]
    pub execution_dir: PathBuf,
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_code_timeout")]
    pub default_timeout_seconds: f64,
    #[serde(default = "default_max_timeout")]
    pub max_timeout_seconds: f64,
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            execution_dir: default_execution_dir(),
            interpreter: default_interpreter(),
            default_timeout_seconds: default_code_timeout(),
            max_timeout_seconds: default_max_timeout(),
            kill_grace_ms: default_kill_grace_ms(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

pub const ENV_EXECUTION_DIR: &str = "PYMENTOR_EXECUTION_DIR";
pub const ENV_INTERPRETER: &str = "PYMENTOR_INTERPRETER";
pub const ENV_DEFAULT_TIMEOUT: &str = "PYMENTOR_DEFAULT_TIMEOUT";
pub const ENV_MAX_TIMEOUT: &str = "PYMENTOR_MAX_TIMEOUT";
pub const ENV_KILL_GRACE_MS: &str = "PYMENTOR_KILL_GRACE_MS";
pub const ENV_MAX_OUTPUT_BYTES: &str = "PYMENTOR_MAX_OUTPUT_BYTES";

/// Upper bound accepted for any configured timeout.
pub const TIMEOUT_LIMIT_SECONDS: f64 = 86_400.0;

impl SandboxConfig {
    /// Builds the configuration from `PYMENTOR_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, MentorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, MentorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_EXECUTION_DIR) {
            config.execution_dir = PathBuf::from(dir);
        }
        if let Some(interpreter) = lookup(ENV_INTERPRETER) {
            config.interpreter = interpreter;
        }
        if let Some(value) = lookup(ENV_DEFAULT_TIMEOUT) {
            config.default_timeout_seconds = parse_env(ENV_DEFAULT_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_TIMEOUT) {
            config.max_timeout_seconds = parse_env(ENV_MAX_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_KILL_GRACE_MS) {
            config.kill_grace_ms = parse_env(ENV_KILL_GRACE_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_OUTPUT_BYTES) {
            config.max_output_bytes = parse_env(ENV_MAX_OUTPUT_BYTES, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MentorError> {
        if self.interpreter.trim().is_empty() {
            return Err(MentorError::ConfigError("Sandbox interpreter cannot be empty".to_string()));
        }
        for (name, value) in [
            ("max_timeout_seconds", self.max_timeout_seconds),
            ("default_timeout_seconds", self.default_timeout_seconds),
        ] {
            if !(value.is_finite() && value > 0.0 && value <= TIMEOUT_LIMIT_SECONDS) {
                return Err(MentorError::ConfigError(format!(
                    "Sandbox {} must be a positive number of at most {} seconds",
                    name, TIMEOUT_LIMIT_SECONDS
                )));
            }
        }
        if self.max_output_bytes == 0 {
            return Err(MentorError::ConfigError(
                "Sandbox max_output_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The budget actually enforced for a requested timeout: invalid values
    /// fall back to the default, anything above the ceiling is clamped.
    pub fn effective_timeout(&self, requested: f64) -> f64 {
        let timeout = if requested.is_finite() && requested > 0.0 {
            requested
        } else {
            self.default_timeout_seconds
        };
        timeout.min(self.max_timeout_seconds)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, MentorError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| MentorError::ConfigError(format!("Invalid value '{}' for {}: {}", value, key, e)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            top_k: default_top_k(),
        }
    }
}

/// Per-turn JSONL trace output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_trace_file")]
    pub trace_file: PathBuf,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trace_file: default_trace_file(),
        }
    }
}

impl MentorConfig {
    pub fn validate(&self) -> Result<(), MentorError> {
        if self.agent.name.is_empty() {
            return Err(MentorError::ConfigError("Agent name cannot be empty".to_string()));
        }

        if !(self.agent.code_timeout_seconds.is_finite() && self.agent.code_timeout_seconds > 0.0) {
            return Err(MentorError::ConfigError(
                "Agent code_timeout_seconds must be a positive number".to_string(),
            ));
        }

        for llm in std::iter::once(&self.llm).chain(self.fallback_llm.iter()) {
            if llm.model.is_empty() {
                return Err(MentorError::ConfigError("LLM model cannot be empty".to_string()));
            }
            if let LlmProvider::Custom { base_url } = &llm.provider {
                if base_url.is_empty() {
                    return Err(MentorError::ConfigError(
                        "Custom provider requires a valid 'base_url'".to_string(),
                    ));
                }
            }
        }

        if self.executor.mode == ExecutorMode::Remote && self.executor.url.is_empty() {
            return Err(MentorError::ConfigError("Executor url cannot be empty".to_string()));
        }

        if self.executor.request_grace_seconds < 0.0 {
            return Err(MentorError::ConfigError(
                "Executor request_grace_seconds cannot be negative".to_string(),
            ));
        }

        if self.executor.mode == ExecutorMode::Local {
            self.executor.local.validate()?;
        }

        if self.knowledge.top_k == 0 {
            return Err(MentorError::ConfigError("Knowledge top_k must be greater than 0".to_string()));
        }

        Ok(())
    }
}

fn default_agent_name() -> String { "python-mentor".to_string() }
fn default_agent_temperature() -> f32 { 0.2 }
fn default_code_timeout() -> f64 { 5.0 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_retries() -> usize { 3 }
fn default_retry_delay_ms() -> u64 { 2000 }
fn default_executor_url() -> String { "http://code-executor:8080".to_string() }
fn default_request_grace() -> f64 { 2.0 }
fn default_execution_dir() -> PathBuf { PathBuf::from("/tmp/executions") }
fn default_interpreter() -> String { "python3".to_string() }
fn default_max_timeout() -> f64 { 30.0 }
fn default_kill_grace_ms() -> u64 { 500 }
fn default_max_output_bytes() -> usize { 1024 * 1024 }
fn default_top_k() -> usize { 4 }
fn default_trace_file() -> PathBuf { PathBuf::from("pymentor_trace.jsonl") }
