//! Execute, ask for a fix on failure, execute the fix once.

use serde::Serialize;
use std::sync::Arc;

use crate::core_types::Message;
use crate::errors::MentorError;
use crate::executors::{CodeExecutor, ExecutionResult, DEFAULT_TIMEOUT_SECONDS};
use crate::extraction::strip_code_fences;
use crate::llm::LLM;

pub const FIX_CODE_PROMPT: &str = "You're a Python mentor fixing a student's code. \
The code below failed with the error shown. Reply with the corrected Python code only, \
with no explanation and no markdown fences.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairState {
    Succeeded,
    Failed,
}

/// Both halves of one turn's execution: the original attempt and, when that
/// failed, the model's fix and how it ran.
#[derive(Debug, Clone, Serialize)]
pub struct RepairAttempt {
    pub original_code: String,
    pub original_result: ExecutionResult,
    pub fixed_code: Option<String>,
    pub fixed_result: Option<ExecutionResult>,
}

impl RepairAttempt {
    pub fn final_state(&self) -> RepairState {
        let last = self.fixed_result.as_ref().unwrap_or(&self.original_result);
        if last.success {
            RepairState::Succeeded
        } else {
            RepairState::Failed
        }
    }

    pub fn execution_count(&self) -> usize {
        1 + usize::from(self.fixed_result.is_some())
    }

    pub fn was_repaired(&self) -> bool {
        self.fixed_code.is_some()
    }

    /// Every error captured, in attempt order.
    pub fn errors(&self) -> Vec<&str> {
        std::iter::once(&self.original_result)
            .chain(self.fixed_result.iter())
            .filter_map(|result| result.error.as_deref())
            .collect()
    }

    /// The result the user ends up with.
    pub fn final_result(&self) -> &ExecutionResult {
        self.fixed_result.as_ref().unwrap_or(&self.original_result)
    }
}

pub struct RepairLoop {
    executor: Arc<dyn CodeExecutor>,
    llm: Arc<dyn LLM>,
    timeout: f64,
    temperature: Option<f32>,
}

impl RepairLoop {
    pub fn new(executor: Arc<dyn CodeExecutor>, llm: Arc<dyn LLM>) -> Self {
        Self {
            executor,
            llm,
            timeout: DEFAULT_TIMEOUT_SECONDS,
            temperature: None,
        }
    }

    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Runs `code`, and on failure runs one model-generated fix with the same
    /// budget. Only a failure to obtain the fix is an error.
    pub async fn run(&self, code: &str) -> Result<RepairAttempt, MentorError> {
        log::info!("Executing original code via {} executor", self.executor.name());
        let original_result = self.executor.execute(code, self.timeout).await;

        let mut attempt = RepairAttempt {
            original_code: code.to_string(),
            original_result,
            fixed_code: None,
            fixed_result: None,
        };
        if attempt.original_result.success {
            return Ok(attempt);
        }

        log::info!(
            "Original code failed, requesting a fix: {}",
            attempt.original_result.error_text().lines().last().unwrap_or_default()
        );
        let fixed_code = self.generate_fix(code, attempt.original_result.error_text()).await?;
        let fixed_result = self.executor.execute(&fixed_code, self.timeout).await;
        log::info!("Fixed code success={}", fixed_result.success);

        attempt.fixed_code = Some(fixed_code);
        attempt.fixed_result = Some(fixed_result);
        Ok(attempt)
    }

    pub async fn generate_fix(&self, code: &str, error: &str) -> Result<String, MentorError> {
        let messages = vec![
            Message::system(FIX_CODE_PROMPT),
            Message::user(format!("CODE:\n```python\n{}\n```\n\nERROR:\n{}", code, error)),
        ];

        let reply = self
            .llm
            .generate_text(messages, self.temperature)
            .await
            .map_err(|e| match e {
                e @ MentorError::LLMError(_) => e,
                other => MentorError::LLMError(format!("Fix generation failed: {}", other)),
            })?;
        Ok(strip_code_fences(&reply))
    }
}
