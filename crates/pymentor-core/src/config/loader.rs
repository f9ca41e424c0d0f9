//! Configuration loader for YAML files and environment resolution

use crate::config::types::*;
use crate::errors::MentorError;
use std::env;
use std::path::Path;
use tokio::fs;

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<MentorConfig, MentorError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            MentorError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_str(&content)?;
        // Relative env files are resolved against the config file's directory
        if let Some(base_dir) = path.parent() {
            for env_file in &mut config.env_files {
                if env_file.is_relative() {
                    let joined = base_dir.join(&*env_file);
                    *env_file = joined;
                }
            }
        }
        Self::resolve_environment(&mut config)?;
        Ok(config)
    }

    /// Parse and validate a YAML document. API keys are resolved from the
    /// current environment; `env_files` are only loaded by `from_file`.
    pub fn from_str(content: &str) -> Result<MentorConfig, MentorError> {
        let mut config: MentorConfig = serde_yaml::from_str(content)
            .map_err(|e| MentorError::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

        Self::resolve_llm_auth(&config.llm.provider.clone(), &mut config.llm.auth);
        if let Some(fallback) = config.fallback_llm.as_mut() {
            Self::resolve_llm_auth(&fallback.provider.clone(), &mut fallback.auth);
        }

        config.validate()?;
        Ok(config)
    }

    fn resolve_environment(config: &mut MentorConfig) -> Result<(), MentorError> {
        let mut loaded = false;
        for env_file in &config.env_files {
            if env_file.exists() {
                Self::load_env_file(env_file)?;
                loaded = true;
            } else {
                log::warn!("Env file {} not found, skipping", env_file.display());
            }
        }

        if loaded {
            Self::resolve_llm_auth(&config.llm.provider.clone(), &mut config.llm.auth);
            if let Some(fallback) = config.fallback_llm.as_mut() {
                Self::resolve_llm_auth(&fallback.provider.clone(), &mut fallback.auth);
            }
        }
        Ok(())
    }

    /// Loads `KEY=value` lines into the process environment. Blank lines and
    /// `#` comments are skipped; surrounding quotes are stripped.
    pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<(), MentorError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MentorError::ConfigError(format!(
                "Failed to read env file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().trim_start_matches("export ").trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                env::set_var(key, value);
            }
        }

        Ok(())
    }

    /// Resolve LLM authentication from environment
    fn resolve_llm_auth(provider: &LlmProvider, auth: &mut LlmAuth) {
        if let Some(env_var) = &auth.api_key_env {
            if let Ok(api_key) = env::var(env_var) {
                auth.api_key = Some(api_key);
            }
        }

        // Fall back to the provider's conventional variables
        if auth.api_key.is_none() && auth.api_key_env.is_none() {
            let candidates: &[&str] = match provider {
                LlmProvider::OpenAI => &["OPENAI_API_KEY"],
                LlmProvider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
                LlmProvider::Custom { .. } => &["LITELLM_MASTER_KEY", "CUSTOM_API_KEY"],
            };
            auth.api_key = candidates.iter().find_map(|name| env::var(name).ok());
        }
    }
}
