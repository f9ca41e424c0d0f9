//! Intent classification for incoming chat messages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::prompts::ROUTER_PROMPT;
use crate::core_types::Message;
use crate::llm::LLM;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CodeExecution,
    KnowledgeRetrieval,
    DirectResponse,
    AskClarification,
}

impl Intent {
    /// Maps a free-form model reply onto an intent by substring. Checks run
    /// in a fixed order and anything unrecognised is a direct response.
    pub fn from_reply(reply: &str) -> Self {
        let reply = reply.trim().to_lowercase();
        if reply.contains("code") {
            Intent::CodeExecution
        } else if reply.contains("knowledge") || reply.contains("retriev") {
            Intent::KnowledgeRetrieval
        } else if reply.contains("ask") || reply.contains("clarif") {
            Intent::AskClarification
        } else {
            Intent::DirectResponse
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CodeExecution => "code_execution",
            Intent::KnowledgeRetrieval => "knowledge_retrieval",
            Intent::DirectResponse => "direct_response",
            Intent::AskClarification => "ask_clarification",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct IntentRouter {
    llm: Arc<dyn LLM>,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self { llm }
    }

    /// Never fails: an unavailable model routes to a direct response.
    pub async fn route(&self, message: &str) -> Intent {
        let messages = vec![Message::system(ROUTER_PROMPT), Message::user(message)];
        match self.llm.generate_text(messages, Some(0.0)).await {
            Ok(reply) => {
                let intent = Intent::from_reply(&reply);
                log::info!("Routing decision: {} (model said '{}')", intent, reply.trim());
                intent
            }
            Err(e) => {
                log::error!("Error in routing, falling back to direct response: {}", e);
                Intent::DirectResponse
            }
        }
    }
}
