//! Bounded retries with an optional fallback model

use crate::core_types::{LLMResponse, Message};
use crate::errors::MentorError;
use crate::llm::LLM;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Tries the primary model up to `max_retries` times, sleeping `delay`
/// between attempts, then the fallback model once. If everything fails the
/// last error is returned as `MentorError::LLMError`.
#[derive(Clone)]
pub struct RetryingLLM {
    primary: Arc<dyn LLM>,
    fallback: Option<Arc<dyn LLM>>,
    max_retries: usize,
    delay: Duration,
}

impl RetryingLLM {
    pub fn new(primary: Arc<dyn LLM>) -> Self {
        Self {
            primary,
            fallback: None,
            max_retries: 3,
            delay: Duration::from_secs(2),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn LLM>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl LLM for RetryingLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<LLMResponse, MentorError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.primary.generate(messages.clone(), temperature).await {
                Ok(response) => {
                    if attempt > 1 {
                        log::info!("LLM call succeeded on attempt {}", attempt);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    log::warn!("LLM attempt {}/{} failed: {}", attempt, self.max_retries, e);
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        if let Some(fallback) = &self.fallback {
            log::info!("Primary LLM exhausted, trying fallback model");
            match fallback.generate(messages, temperature).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    log::error!("Fallback LLM failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(MentorError::LLMError(format!("All LLM attempts failed: {}", detail)))
    }
}
