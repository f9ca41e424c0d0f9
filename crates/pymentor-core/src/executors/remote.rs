// src/executors/remote.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::{CodeExecutor, ExecutionRequest, ExecutionResult, DEFAULT_TIMEOUT_SECONDS};
use crate::errors::MentorError;

const DEFAULT_REQUEST_GRACE_SECONDS: f64 = 2.0;

/// Client for the sandbox's `POST /execute` endpoint.
///
/// Every transport outcome is folded into an `ExecutionResult`, so callers
/// treat an unreachable service exactly like code that failed.
#[derive(Debug, Clone)]
pub struct RemoteCodeExecutor {
    client: Client,
    base_url: String,
    request_grace: f64,
}

impl RemoteCodeExecutor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_grace: DEFAULT_REQUEST_GRACE_SECONDS,
        }
    }

    /// Transport time allowed on top of the execution budget.
    pub fn with_request_grace(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds >= 0.0 {
            self.request_grace = seconds;
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execution budget and HTTP deadline for a requested timeout. Values
    /// that are not positive, or too large for a deadline, use the default.
    fn request_budget(&self, timeout: f64) -> (f64, Duration) {
        if timeout.is_finite() && timeout > 0.0 {
            if let Ok(deadline) = Duration::try_from_secs_f64(timeout + self.request_grace) {
                return (timeout, deadline);
            }
            log::warn!("Timeout {}s is out of range, using the default", timeout);
        }
        let deadline = Duration::try_from_secs_f64(DEFAULT_TIMEOUT_SECONDS + self.request_grace)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS + DEFAULT_REQUEST_GRACE_SECONDS));
        (DEFAULT_TIMEOUT_SECONDS, deadline)
    }

    pub async fn health_check(&self) -> Result<(), MentorError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| MentorError::CodeExecutionError(format!("Health check failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MentorError::CodeExecutionError(format!(
                "Health check returned status {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl CodeExecutor for RemoteCodeExecutor {
    async fn execute(&self, code: &str, timeout: f64) -> ExecutionResult {
        let (timeout, request_timeout) = self.request_budget(timeout);
        let url = format!("{}/execute", self.base_url);
        let request = ExecutionRequest::new(code).with_timeout(timeout);

        log::debug!("Sending {} bytes of code to {}", code.len(), url);

        let response = self
            .client
            .post(&url)
            .timeout(request_timeout)
            .json(&request)
            .send()
            .await;

        let result = match response {
            Ok(response) if response.status() == StatusCode::OK => {
                match response.json::<ExecutionResult>().await {
                    Ok(result) => result,
                    Err(e) => transport_failure(e, timeout),
                }
            }
            Ok(response) => {
                let status = response.status();
                log::error!("Code execution service at {} returned {}", url, status);
                ExecutionResult::failed(
                    format!("Code execution service error: {}", status.as_u16()),
                    0.0,
                )
            }
            Err(e) => transport_failure(e, timeout),
        };

        log::info!(
            "Remote execution finished: success={} in {:.3}s",
            result.success,
            result.execution_time
        );
        result
    }

    fn name(&self) -> &str {
        "remote"
    }
}

fn transport_failure(error: reqwest::Error, timeout: f64) -> ExecutionResult {
    if error.is_timeout() {
        log::warn!("Request to code execution service timed out");
        ExecutionResult::failed("Request to code execution service timed out", timeout)
    } else {
        log::error!("Error communicating with code execution service: {}", error);
        ExecutionResult::failed(
            format!("Error communicating with code execution service: {}", error),
            0.0,
        )
    }
}
