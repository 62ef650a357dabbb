//! Knowledge corpus and keyword search
//!
//! Documents are loaded once at startup and never mutated. Pipelines reach the
//! corpus through `KnowledgeSource`, which lets tests substitute an
//! unreachable backend; the in-memory `Corpus` itself never fails a search.

pub mod corpus;
pub mod search;

pub use corpus::Corpus;
pub use search::{search, tokenize};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One searchable unit of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            text: text.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A scored search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub excerpt: String,
    /// Number of distinct query tokens present in the document
    pub score: usize,
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge source {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Knowledge source unavailable: {0}")]
    Unavailable(String),
}

/// Read-only corpus access used by `search` pipeline steps
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Match>, KnowledgeError>;

    /// Number of documents available
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
