//! Knowledge lookup for concept questions.
//!
//! The mentor only needs `retrieve(query) -> [{content, source}]`. The
//! bundled `KeywordRetriever` ranks an in-memory corpus by term overlap, which
//! is enough for a curated set of Python notes loaded from configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::MentorError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub content: String,
    #[serde(default = "unknown_source")]
    pub source: String,
}

fn unknown_source() -> String {
    "unknown".to_string()
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, MentorError>;
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "do", "does", "for", "how", "i", "in", "is", "it", "of", "on",
    "or", "the", "to", "what", "when", "why", "with", "you", "can", "me", "my",
];

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() > 1 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

pub struct KeywordRetriever {
    documents: Vec<(Document, HashSet<String>)>,
    top_k: usize,
}

impl KeywordRetriever {
    pub fn new(documents: Vec<Document>, top_k: usize) -> Self {
        let documents = documents
            .into_iter()
            .map(|doc| {
                let index = terms(&doc.content);
                (doc, index)
            })
            .collect();
        Self { documents, top_k }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, MentorError> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, usize, &Document)> = self
            .documents
            .iter()
            .enumerate()
            .filter_map(|(position, (doc, index))| {
                let score = query_terms.intersection(index).count();
                (score > 0).then_some((score, position, doc))
            })
            .collect();

        // Highest overlap first, corpus order breaks ties
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let results: Vec<Document> = scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, _, doc)| doc.clone())
            .collect();
        log::debug!("Retrieved {} documents for query '{}'", results.len(), query);
        Ok(results)
    }
}
