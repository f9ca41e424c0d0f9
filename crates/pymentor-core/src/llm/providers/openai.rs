use crate::core_types::{LLMResponse, Message, Role, Usage};
use crate::errors::MentorError;
use crate::llm::LLM;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GEMINI_OPENAI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Client for any endpoint implementing `POST {api_base}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    request_timeout: Duration,
}

impl OpenAIClient {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: OPENAI_API_BASE.to_string(),
            model,
            temperature: None,
            max_tokens: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Gemini through Google's OpenAI-compatible endpoint
    pub fn gemini(api_key: String, model: String) -> Self {
        Self::new(Some(api_key), model).with_api_base(GEMINI_OPENAI_API_BASE.to_string())
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request_body(&self, messages: &[Message], temperature: Option<f32>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.format_messages(messages),
        });

        if let Some(temp) = temperature.or(self.temperature) {
            body["temperature"] = temp.into();
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        body
    }

    fn format_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                json!({
                    "role": format_role(msg.role),
                    "content": msg.content
                })
            })
            .collect()
    }

    fn parse_response(&self, response: Value) -> Result<LLMResponse, MentorError> {
        let choices = response["choices"]
            .as_array()
            .ok_or_else(|| MentorError::ParsingError("No choices in response".to_string()))?;

        let choice = choices
            .first()
            .ok_or_else(|| MentorError::ParsingError("Empty choices array".to_string()))?;

        let content = choice["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| MentorError::ParsingError("Response has no message content".to_string()))?;

        let usage = serde_json::from_value::<Usage>(response["usage"].clone()).ok();

        Ok(LLMResponse {
            content: Some(content),
            finish_reason: choice["finish_reason"].as_str().map(|s| s.to_string()),
            usage,
        })
    }
}

fn format_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl LLM for OpenAIClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<LLMResponse, MentorError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request_body(&messages, temperature);

        log::debug!("Chat completion request to {} ({} messages)", url, messages.len());
        log::debug!("Request body: {}", body);

        let mut request = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MentorError::LLMError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| MentorError::LLMError(format!("Failed to read response: {}", e)))?;

        log::debug!("Chat completion response ({}): {}", status, response_text);

        if !status.is_success() {
            return Err(MentorError::LLMError(format!(
                "API request failed with status {}: {}",
                status, response_text
            )));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| MentorError::ParsingError(format!("Invalid JSON response: {}", e)))?;

        self.parse_response(response_json)
    }
}
