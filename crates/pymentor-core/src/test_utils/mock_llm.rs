// src/test_utils/mock_llm.rs
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core_types::{LLMResponse, Message};
use crate::errors::MentorError;
use crate::executors::{CodeExecutor, ExecutionResult};
use crate::llm::LLM;

/// Replays canned replies in order and records every prompt it receives.
#[derive(Clone, Default)]
pub struct ScriptedLLM {
    replies: Arc<Mutex<VecDeque<Result<String, MentorError>>>>,
    pub calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedLLM {
    pub fn new(replies: Vec<Result<String, MentorError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> Vec<Message> {
        self.calls.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        _temperature: Option<f32>,
    ) -> Result<LLMResponse, MentorError> {
        self.calls.lock().unwrap().push(messages);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(LLMResponse::text(text)),
            Some(Err(e)) => Err(e),
            None => Err(MentorError::LLMError("No more mock responses".to_string())),
        }
    }
}

/// Returns canned results in order and records the code it was given.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    results: Arc<Mutex<VecDeque<ExecutionResult>>>,
    pub executed: Arc<Mutex<Vec<(String, f64)>>>,
}

impl ScriptedExecutor {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::from(results))),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn executed_code(&self) -> Vec<String> {
        self.executed.lock().unwrap().iter().map(|(code, _)| code.clone()).collect()
    }
}

#[async_trait]
impl CodeExecutor for ScriptedExecutor {
    async fn execute(&self, code: &str, timeout: f64) -> ExecutionResult {
        self.executed.lock().unwrap().push((code.to_string(), timeout));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ExecutionResult::failed("No more scripted results", 0.0))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
