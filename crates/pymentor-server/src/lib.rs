//! Chat HTTP surface for the mentor agent.
//!
//! One agent serves every session. Sessions are created on first use and
//! kept in memory for the life of the process.

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use pymentor_core::{ExecutorMode, MentorAgent, MentorConfig, MentorError, RemoteCodeExecutor, SessionStore};
use pymentor_sandbox::{apply_layers, ServerConfig, ServerError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use pymentor_sandbox::shutdown_signal;

/// Reply sent in place of any pipeline failure.
pub const APOLOGY: &str = "I'm sorry, I encountered an error processing your request. \
Please try again with a different question.";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub session_count: usize,
    pub session_ids: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<MentorAgent>,
    pub sessions: Arc<SessionStore>,
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    if request.message.trim().is_empty() {
        return Err(ServerError::invalid_request("message must not be empty"));
    }

    let (session_id, session) = state.sessions.get_or_create(request.session_id.as_deref()).await;
    let mut session = session.lock().await;

    let response = match state.agent.handle_turn(&mut session, &request.message).await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Error processing chat for session {}: {}", session_id, e);
            APOLOGY.to_string()
        }
    };

    Ok(Json(ChatResponse { response, session_id }))
}

async fn sessions_handler(State(state): State<AppState>) -> Json<SessionsResponse> {
    let session_ids = state.sessions.session_ids().await;
    Json(SessionsResponse {
        session_count: session_ids.len(),
        session_ids,
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Applies command line overrides to a loaded configuration and validates
/// the result, so sections switched on by a flag are checked too.
pub fn apply_overrides(mut config: MentorConfig, local_executor: bool) -> Result<MentorConfig, MentorError> {
    if local_executor {
        config.executor.mode = ExecutorMode::Local;
    }
    config.validate()?;
    Ok(config)
}

/// Probes the execution service when the remote executor is configured.
/// Returns false if the service did not answer; the server still starts.
pub async fn check_execution_service(config: &MentorConfig) -> bool {
    if config.executor.mode != ExecutorMode::Remote {
        return true;
    }
    let executor = RemoteCodeExecutor::new(config.executor.url.clone());
    match executor.health_check().await {
        Ok(()) => {
            log::info!("Code execution service at {} is healthy", executor.base_url());
            true
        }
        Err(e) => {
            log::warn!(
                "Code execution service at {} is not reachable yet: {}",
                executor.base_url(),
                e
            );
            false
        }
    }
}

pub struct ChatServer {
    state: AppState,
    config: ServerConfig,
}

impl ChatServer {
    pub fn new(agent: MentorAgent) -> Self {
        Self {
            state: AppState {
                agent: Arc::new(agent),
                sessions: Arc::new(SessionStore::new()),
            },
            config: ServerConfig::default()
                .with_bind_addr(std::net::SocketAddr::from(([127, 0, 0, 1], 3001)))
                .with_cors(true),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        self.state.sessions.clone()
    }

    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/chat", post(chat_handler))
            .route("/sessions", get(sessions_handler))
            .with_state(self.state.clone());

        apply_layers(router, &self.config)
    }

    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> pymentor_sandbox::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = pymentor_sandbox::http::bind(&self.config).await?;

        log::info!("Mentor server listening on {}", self.config.bind_addr);
        log::info!("Chat endpoint: http://{}/chat", self.config.bind_addr);
        log::info!("Executor: {}", self.state.agent.executor_name());

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pymentor_core::core_types::{LLMResponse, Message};
    use pymentor_core::knowledge::KeywordRetriever;
    use pymentor_core::{CodeExecutor, ExecutionResult, MentorError, LLM};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt; // for `oneshot`

    /// Replies in order; errors once the script runs out.
    struct QueuedLLM(Mutex<VecDeque<String>>);

    impl QueuedLLM {
        fn new(replies: &[&str]) -> Self {
            Self(Mutex::new(replies.iter().map(|r| r.to_string()).collect()))
        }
    }

    #[async_trait]
    impl LLM for QueuedLLM {
        async fn generate(&self, _messages: Vec<Message>, _temperature: Option<f32>) -> Result<LLMResponse, MentorError> {
            match self.0.lock().unwrap().pop_front() {
                Some(reply) => Ok(LLMResponse::text(reply)),
                None => Err(MentorError::LLMError("provider unavailable".to_string())),
            }
        }
    }

    struct EchoExecutor;

    #[async_trait]
    impl CodeExecutor for EchoExecutor {
        async fn execute(&self, code: &str, _timeout: f64) -> ExecutionResult {
            ExecutionResult::succeeded(format!("ran {} bytes\n", code.len()), 0.01)
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn server(replies: &[&str]) -> ChatServer {
        let agent = MentorAgent::new(
            Arc::new(QueuedLLM::new(replies)),
            Arc::new(EchoExecutor),
            Arc::new(KeywordRetriever::new(Vec::new(), 3)),
        );
        ChatServer::new(agent).with_config(ServerConfig::default().with_logging(false))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn mentor_config(yaml: &str) -> MentorConfig {
        pymentor_core::ConfigLoader::from_str(yaml).unwrap()
    }

    const BASE_CONFIG: &str = r#"
llm:
  provider: openai
  model: gpt-4.1-mini
  auth:
    api_key: sk-test
executor:
  local:
    max_timeout_seconds: -1
"#;

    #[test]
    fn test_local_override_is_validated() {
        let config = mentor_config(BASE_CONFIG);

        let err = apply_overrides(config.clone(), true).unwrap_err();
        assert!(matches!(err, MentorError::ConfigError(_)));

        let remote = apply_overrides(config, false).unwrap();
        assert_eq!(remote.executor.mode, ExecutorMode::Remote);
    }

    #[tokio::test]
    async fn test_execution_service_probe() {
        let app = Router::new().route("/health", get(|| async { Json(json!({ "status": "ok" })) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut config = mentor_config(BASE_CONFIG);
        config.executor.url = format!("http://{}", addr);
        assert!(check_execution_service(&config).await);

        let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        config.executor.url = format!("http://{}", closed.local_addr().unwrap());
        drop(closed);
        assert!(!check_execution_service(&config).await);

        config.executor.mode = ExecutorMode::Local;
        assert!(check_execution_service(&config).await);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(
            server(&[]).build_router(),
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_chat_creates_session_and_answers() {
        let server = server(&["direct_response", "Lists are mutable, tuples are not."]);
        let sessions = server.sessions();

        let (status, body) = send(
            server.build_router(),
            chat(json!({ "message": "What's the difference between a list and a tuple?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Lists are mutable, tuples are not.");
        let session_id = body["session_id"].as_str().unwrap().to_string();
        assert!(!session_id.is_empty());

        let (_, session) = sessions.get_or_create(Some(&session_id)).await;
        let session = session.lock().await;
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_chat_reuses_given_session() {
        let server = server(&["direct_response", "first", "direct_response", "second"]);
        let app = server.build_router();

        let (_, first) = send(app.clone(), chat(json!({ "message": "hi", "session_id": "abc" }))).await;
        let (_, second) = send(app.clone(), chat(json!({ "message": "again", "session_id": "abc" }))).await;
        assert_eq!(first["session_id"], "abc");
        assert_eq!(second["response"], "second");

        let (status, body) = send(app, Request::builder().uri("/sessions").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "session_count": 1, "session_ids": ["abc"] }));

        let (_, session) = server.sessions().get_or_create(Some("abc")).await;
        assert_eq!(session.lock().await.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_code_turn_runs_snippet() {
        let server = server(&["code_execution", "Your code printed 1."]);

        let (status, body) = send(
            server.build_router(),
            chat(json!({ "message": "Run this:\n```python\nprint(1)\n```", "session_id": "code" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Your code printed 1.");
        let (_, session) = server.sessions().get_or_create(Some("code")).await;
        let session = session.lock().await;
        let attempt = session.context.execution.as_ref().unwrap();
        assert_eq!(attempt.original_code, "print(1)");
        assert!(attempt.original_result.success);
    }

    #[tokio::test]
    async fn test_agent_failure_becomes_apology() {
        let (status, body) = send(
            server(&[]).build_router(),
            chat(json!({ "message": "Explain decorators", "session_id": "s1" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], APOLOGY);
        assert_eq!(body["session_id"], "s1");
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let (status, body) = send(server(&[]).build_router(), chat(json!({ "message": "   " }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
    }
}
