//! The mentor pipeline.
//!
//! Each turn is routed to one of four handlers. Code turns extract the
//! snippet and, when the user asked for it to be run, execute it through the
//! repair loop; knowledge turns consult the retriever. Both then feed a
//! context block into the final response prompt. Clarification and direct
//! turns answer straight from the model.

use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;

pub mod prompts;
pub mod router;

pub use router::{Intent, IntentRouter};

use crate::config::{ExecutorMode, MentorConfig};
use crate::core_types::Message;
use crate::errors::MentorError;
use crate::executors::{CodeExecutor, ExecutionResult, ProcessCodeExecutor, RemoteCodeExecutor};
use crate::extraction::{extract_code, is_execution_requested};
use crate::knowledge::{KeywordRetriever, Retriever};
use crate::llm::{create_mentor_llm, LLM};
use crate::repair::{RepairAttempt, RepairLoop};
use crate::session::{Session, TurnContext};
use crate::trace::{TraceKind, TurnTracer};
use prompts::{CLARIFICATION_PROMPT, DIRECT_RESPONSE_PROMPT, EXPLAIN_CODE_PROMPT, RESPONSE_PROMPT};

pub struct MentorAgent {
    llm: Arc<dyn LLM>,
    executor: Arc<dyn CodeExecutor>,
    retriever: Arc<dyn Retriever>,
    router: IntentRouter,
    tracer: TurnTracer,
    temperature: f32,
    code_timeout: f64,
}

impl MentorAgent {
    pub fn new(llm: Arc<dyn LLM>, executor: Arc<dyn CodeExecutor>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            router: IntentRouter::new(llm.clone()),
            llm,
            executor,
            retriever,
            tracer: TurnTracer::disabled(),
            temperature: 0.2,
            code_timeout: crate::executors::DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Wires the agent from configuration: retrying LLM stack, the executor
    /// for the configured mode, the keyword retriever and the tracer.
    pub fn from_config(config: &MentorConfig) -> Result<Self, MentorError> {
        let llm = create_mentor_llm(config)?;

        let executor: Arc<dyn CodeExecutor> = match config.executor.mode {
            ExecutorMode::Remote => {
                log::info!("Using code execution service at {}", config.executor.url);
                Arc::new(
                    RemoteCodeExecutor::new(config.executor.url.clone())
                        .with_request_grace(config.executor.request_grace_seconds),
                )
            }
            ExecutorMode::Local => {
                log::info!(
                    "Using in-process executor ({} in {})",
                    config.executor.local.interpreter,
                    config.executor.local.execution_dir.display()
                );
                Arc::new(ProcessCodeExecutor::new(config.executor.local.clone()))
            }
        };

        let retriever = Arc::new(KeywordRetriever::new(
            config.knowledge.documents.clone(),
            config.knowledge.top_k,
        ));
        if retriever.is_empty() {
            log::warn!("No knowledge documents configured; concept questions get no retrieved context");
        } else {
            log::info!("Loaded {} knowledge documents", retriever.len());
        }
        let tracer = TurnTracer::new(&config.tracing)?;

        Ok(Self::new(llm, executor, retriever)
            .with_tracer(tracer)
            .with_temperature(config.agent.temperature)
            .with_code_timeout(config.agent.code_timeout_seconds))
    }

    pub fn with_tracer(mut self, tracer: TurnTracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_code_timeout(mut self, timeout: f64) -> Self {
        self.code_timeout = timeout;
        self
    }

    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }

    /// Runs one chat turn against `session` and returns the mentor's reply.
    pub async fn handle_turn(&self, session: &mut Session, message: &str) -> Result<String, MentorError> {
        session.begin_turn(message);

        let intent = self.router.route(message).await;
        session.context.intent = Some(intent);
        self.tracer
            .record(&session.id, TraceKind::Route, json!({ "intent": intent }))
            .await;

        let response = match intent {
            Intent::CodeExecution => self.handle_code(session, message).await?,
            Intent::KnowledgeRetrieval => self.handle_knowledge(session, message).await?,
            Intent::AskClarification => self.ask(CLARIFICATION_PROMPT, message).await?,
            Intent::DirectResponse => self.ask(DIRECT_RESPONSE_PROMPT, message).await?,
        };

        session.push_assistant(response.clone());
        self.tracer
            .record(
                &session.id,
                TraceKind::Response,
                json!({ "intent": intent, "length": response.len() }),
            )
            .await;
        Ok(response)
    }

    async fn handle_code(&self, session: &mut Session, message: &str) -> Result<String, MentorError> {
        let code = match extract_code(message, self.llm.as_ref()).await {
            Ok(code) => code,
            Err(MentorError::ParsingError(reason)) => {
                log::info!("Routed to code execution but no code found ({}), answering directly", reason);
                return self.ask(DIRECT_RESPONSE_PROMPT, message).await;
            }
            Err(e) => return Err(e),
        };

        if is_execution_requested(message) {
            let repair = RepairLoop::new(self.executor.clone(), self.llm.clone())
                .with_timeout(self.code_timeout)
                .with_temperature(self.temperature);
            let attempt = repair.run(&code).await?;
            self.trace_execution(&session.id, &attempt).await;
            session.context.execution = Some(attempt);
        } else {
            log::info!("Execution not requested, explaining code only");
        }
        session.context.code = Some(code);

        self.generate_response(&session.context, message).await
    }

    async fn handle_knowledge(&self, session: &mut Session, message: &str) -> Result<String, MentorError> {
        match self.retriever.retrieve(message).await {
            Ok(docs) => {
                self.tracer
                    .record(
                        &session.id,
                        TraceKind::Retrieval,
                        json!({ "sources": docs.iter().map(|d| d.source.as_str()).collect::<Vec<_>>() }),
                    )
                    .await;
                session.context.retrieved_docs = docs;
            }
            Err(e) => log::warn!("Knowledge retrieval failed, answering without it: {}", e),
        }
        self.generate_response(&session.context, message).await
    }

    async fn trace_execution(&self, session_id: &str, attempt: &RepairAttempt) {
        self.tracer
            .record(
                session_id,
                TraceKind::CodeExecution,
                json!({
                    "executor": self.executor.name(),
                    "result": attempt.original_result,
                }),
            )
            .await;
        if attempt.was_repaired() {
            self.tracer
                .record(
                    session_id,
                    TraceKind::Repair,
                    json!({
                        "fixed_code": attempt.fixed_code,
                        "result": attempt.fixed_result,
                        "final_state": attempt.final_state(),
                    }),
                )
                .await;
        }
    }

    async fn generate_response(&self, context: &TurnContext, message: &str) -> Result<String, MentorError> {
        let system = if context.code.is_some() && context.execution.is_none() {
            EXPLAIN_CODE_PROMPT
        } else {
            RESPONSE_PROMPT
        };
        let user = format!("USER QUESTION: {}\n\nCONTEXT:\n{}", message, build_context(context));
        self.llm
            .generate_text(vec![Message::system(system), Message::user(user)], Some(self.temperature))
            .await
    }

    async fn ask(&self, system: &str, message: &str) -> Result<String, MentorError> {
        self.llm
            .generate_text(vec![Message::system(system), Message::user(message)], Some(self.temperature))
            .await
    }
}

/// Renders the turn context for the response prompt. When a repair happened
/// both attempts are shown so a double failure keeps both errors.
pub fn build_context(context: &TurnContext) -> String {
    let mut out = String::new();

    if !context.retrieved_docs.is_empty() {
        out.push_str("RELEVANT KNOWLEDGE:\n");
        for doc in &context.retrieved_docs {
            let _ = writeln!(out, "- {} (source: {})", doc.content, doc.source);
        }
    }

    match (&context.execution, &context.code) {
        (Some(attempt), _) => {
            out.push_str("\nCODE EXECUTION:\n");
            write_attempt(&mut out, &attempt.original_code, &attempt.original_result);
            if let (Some(fixed_code), Some(fixed_result)) = (&attempt.fixed_code, &attempt.fixed_result) {
                out.push_str("\nFIXED CODE (suggested after the error above):\n");
                write_attempt(&mut out, fixed_code, fixed_result);
            }
        }
        (None, Some(code)) => {
            let _ = write!(out, "\nCODE (not executed):\n```python\n{}\n```\n", code);
        }
        (None, None) => {}
    }

    out
}

fn write_attempt(out: &mut String, code: &str, result: &ExecutionResult) {
    let _ = write!(out, "```python\n{}\n```\n\n", code);
    if result.success {
        let _ = writeln!(out, "Output:\n{}", result.output);
    } else {
        let _ = writeln!(out, "Error:\n{}", result.error_text());
    }
}
