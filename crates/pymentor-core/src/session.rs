//! Per-session conversation records.
//!
//! Sessions live in process memory only. Each one is behind its own mutex so
//! turns within a session are serialized while different sessions proceed in
//! parallel.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::agent::Intent;
use crate::core_types::Message;
use crate::knowledge::Document;
use crate::repair::RepairAttempt;

/// What the pipeline learned during the current turn. Cleared when the next
/// turn starts.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub intent: Option<Intent>,
    pub retrieved_docs: Vec<Document>,
    pub code: Option<String>,
    pub execution: Option<RepairAttempt>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub context: TurnContext,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            context: TurnContext::default(),
            created_at: now,
            last_active: now,
        }
    }

    /// Records the user's message and starts from an empty turn context.
    pub fn begin_turn(&mut self, message: &str) {
        self.context = TurnContext::default();
        self.messages.push(Message::user(message));
        self.last_active = Utc::now();
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `id`, creating the session if needed. A missing or blank id
    /// gets a fresh UUID.
    pub async fn get_or_create(&self, id: Option<&str>) -> (String, Arc<Mutex<Session>>) {
        let id = match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        if let Some(session) = self.sessions.read().await.get(&id) {
            return (id, session.clone());
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                log::info!("Created session {}", id);
                Arc::new(Mutex::new(Session::new(id.clone())))
            })
            .clone();
        (id, session)
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
