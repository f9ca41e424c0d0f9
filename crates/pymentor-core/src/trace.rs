// src/trace.rs
//! JSONL trace of each turn's pipeline steps
//!
//! One line per event, appended to `tracing.trace_file`, so a session can be
//! replayed after the fact: which intent was picked, what ran, whether a
//! repair happened and what the mentor answered.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::TracingConfig;
use crate::errors::MentorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Route,
    CodeExecution,
    Repair,
    Retrieval,
    Response,
}

#[derive(Debug, Serialize)]
struct TraceLine<'a> {
    timestamp: String,
    session_id: &'a str,
    event: TraceKind,
    data: Value,
}

#[derive(Clone)]
pub struct TurnTracer {
    file: Option<Arc<Mutex<File>>>,
}

impl TurnTracer {
    pub fn new(config: &TracingConfig) -> Result<Self, MentorError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.trace_file)
            .map_err(|e| {
                MentorError::ConfigError(format!(
                    "Failed to open trace file {}: {}",
                    config.trace_file.display(),
                    e
                ))
            })?;
        log::info!("Writing turn traces to {}", config.trace_file.display());
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Appends one event. Write failures are logged, never propagated.
    pub async fn record(&self, session_id: &str, event: TraceKind, data: Value) {
        let Some(file) = &self.file else {
            return;
        };

        let line = TraceLine {
            timestamp: Utc::now().to_rfc3339(),
            session_id,
            event,
            data,
        };
        let json = match serde_json::to_string(&line) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize trace event: {}", e);
                return;
            }
        };

        let mut file = file.lock().await;
        if let Err(e) = writeln!(file, "{}", json) {
            log::error!("Failed to write trace event: {}", e);
        }
    }
}
