//! Execution service for untrusted Python snippets.
//!
//! `POST /execute` runs one snippet through `ProcessCodeExecutor` and always
//! answers 200 with an `ExecutionResult` once execution was attempted, even
//! when the code failed or timed out. Non-200 answers are reserved for
//! requests rejected before anything ran. `GET /health` is a fixed readiness
//! probe.

pub mod error;
pub mod http;

pub use error::{Result, ServerError};
pub use http::{apply_layers, shutdown_signal, ServerConfig};

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use pymentor_core::executors::{format_seconds, CodeExecutor, ExecutionRequest, ExecutionResult};
use pymentor_core::{ProcessCodeExecutor, SandboxConfig};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct SandboxState {
    pub executor: Arc<dyn CodeExecutor>,
    pub max_timeout: f64,
}

async fn execute_handler(
    State(state): State<SandboxState>,
    Json(request): Json<ExecutionRequest>,
) -> std::result::Result<Json<ExecutionResult>, ServerError> {
    if !(request.timeout.is_finite() && request.timeout > 0.0) {
        log::warn!("Rejecting execution request with timeout {}", request.timeout);
        return Err(ServerError::invalid_request(format!(
            "timeout must be a positive number of seconds, got {}",
            request.timeout
        )));
    }
    if request.timeout > state.max_timeout {
        log::warn!(
            "Requested timeout {}s exceeds the {}s ceiling, clamping",
            format_seconds(request.timeout),
            format_seconds(state.max_timeout)
        );
    }

    let result = state
        .executor
        .execute(&request.code, request.timeout.min(state.max_timeout))
        .await;
    Ok(Json(result))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// The execution service.
pub struct SandboxServer {
    state: SandboxState,
    config: ServerConfig,
}

impl SandboxServer {
    /// Serve `sandbox` through a process executor with default listener settings.
    pub fn new(sandbox: SandboxConfig) -> Self {
        let max_timeout = sandbox.max_timeout_seconds;
        Self::with_executor(Arc::new(ProcessCodeExecutor::new(sandbox)), max_timeout)
    }

    pub fn with_executor(executor: Arc<dyn CodeExecutor>, max_timeout: f64) -> Self {
        Self {
            state: SandboxState { executor, max_timeout },
            config: ServerConfig::default(),
        }
    }

    pub fn with_server_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/execute", post(execute_handler))
            .with_state(self.state.clone());

        apply_layers(router, &self.config)
    }

    /// Start the server with graceful shutdown support.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = http::bind(&self.config).await?;

        log::info!("Execution service listening on {}", self.config.bind_addr);
        log::info!("Execute endpoint: http://{}/execute", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("Execution service shut down gracefully");
        Ok(())
    }
}
