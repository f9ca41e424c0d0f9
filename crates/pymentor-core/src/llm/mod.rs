//! Language model abstractions.
//!
//! Every backend the mentor talks to speaks the OpenAI chat completions
//! protocol, so a single client covers OpenAI, Gemini's compatible endpoint
//! and a LiteLLM proxy. `RetryingLLM` layers bounded retries and a fallback
//! model on top.

pub use crate::core_types::{LLMResponse, Message};
use crate::errors::MentorError;
use async_trait::async_trait;

pub mod providers;
pub mod retry;

pub use providers::openai::OpenAIClient;
pub use providers::{create_llm_client, create_mentor_llm};
pub use retry::RetryingLLM;

#[async_trait]
pub trait LLM: Send + Sync {
    /// `temperature` overrides the client's configured value for this call.
    async fn generate(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<LLMResponse, MentorError>;

    async fn generate_text(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<String, MentorError> {
        self.generate(messages, temperature)
            .await?
            .content
            .ok_or_else(|| MentorError::LLMError("Response has no content".to_string()))
    }
}
