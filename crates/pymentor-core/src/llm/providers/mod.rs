//! LLM provider construction
//!
//! All providers go through `OpenAIClient`; they differ only in base URL and
//! in whether an API key is mandatory.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{LlmConfig, LlmProvider, MentorConfig};
use crate::errors::MentorError;
use crate::llm::{RetryingLLM, LLM};

pub mod openai;

use openai::{OpenAIClient, GEMINI_OPENAI_API_BASE};

/// Create an LLM client based on the provider configuration
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, MentorError> {
    let api_key = config.auth.api_key.clone().or_else(|| {
        config
            .auth
            .api_key_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var).ok())
    });

    let client = match &config.provider {
        LlmProvider::OpenAI => {
            let api_key = api_key.ok_or_else(|| {
                MentorError::ConfigError(
                    "No API key found for OpenAI. Set api_key or api_key_env".to_string(),
                )
            })?;
            OpenAIClient::new(Some(api_key), config.model.clone())
        }
        LlmProvider::Gemini => {
            let api_key = api_key.ok_or_else(|| {
                MentorError::ConfigError(
                    "No API key found for Gemini. Set api_key, api_key_env or GOOGLE_API_KEY"
                        .to_string(),
                )
            })?;
            OpenAIClient::new(Some(api_key), config.model.clone())
                .with_api_base(GEMINI_OPENAI_API_BASE.to_string())
        }
        // Local proxies usually run without auth
        LlmProvider::Custom { base_url } => {
            OpenAIClient::new(api_key, config.model.clone()).with_api_base(base_url.clone())
        }
    };

    let mut client = client.with_request_timeout(Duration::from_secs(
        config.parameters.request_timeout_seconds,
    ));
    if config.parameters.max_tokens > 0 {
        client = client.with_max_tokens(config.parameters.max_tokens);
    }

    log::info!("Created {:?} client for model {}", config.provider, config.model);
    Ok(Arc::new(client))
}

/// Builds the mentor's text generator: the primary model wrapped in bounded
/// retries, plus the fallback model when one is configured and usable.
pub fn create_mentor_llm(config: &MentorConfig) -> Result<Arc<dyn LLM>, MentorError> {
    let primary = create_llm_client(&config.llm)?;

    let fallback = match &config.fallback_llm {
        Some(fallback_config) => match create_llm_client(fallback_config) {
            Ok(client) => Some(client),
            Err(e) => {
                log::warn!("Fallback LLM disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let mut llm = RetryingLLM::new(primary)
        .with_max_retries(config.retry.max_retries)
        .with_delay(Duration::from_millis(config.retry.delay_ms));
    if let Some(fallback) = fallback {
        llm = llm.with_fallback(fallback);
    }
    Ok(Arc::new(llm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    #[test]
    fn test_openai_requires_key() {
        let config = ConfigLoader::from_str(
            r#"
llm:
  provider: openai
  model: gpt-4.1-mini
  auth:
    api_key_env: PYMENTOR_TEST_UNSET_KEY_VARIABLE
"#,
        )
        .unwrap();

        let err = create_llm_client(&config.llm).err().unwrap();
        assert!(matches!(err, MentorError::ConfigError(_)));
    }

    #[test]
    fn test_custom_provider_works_without_key() {
        let config = ConfigLoader::from_str(
            r#"
llm:
  provider:
    custom:
      base_url: http://litellm:4000/v1
  model: gemini/gemini-2.0-flash
  auth:
    api_key_env: PYMENTOR_TEST_UNSET_KEY_VARIABLE
"#,
        )
        .unwrap();

        assert!(create_llm_client(&config.llm).is_ok());
        assert!(create_mentor_llm(&config).is_ok());
    }

    #[test]
    fn test_unusable_fallback_is_skipped() {
        let config = ConfigLoader::from_str(
            r#"
llm:
  provider:
    custom:
      base_url: http://litellm:4000/v1
  model: gemini/gemini-2.0-flash
fallback_llm:
  provider: gemini
  model: gemini-2.0-flash
  auth:
    api_key_env: PYMENTOR_TEST_UNSET_KEY_VARIABLE
"#,
        )
        .unwrap();

        assert!(create_mentor_llm(&config).is_ok());
    }
}
