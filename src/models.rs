//! Core data models used throughout PiriChat.
//!
//! These types represent the clients, documents, chunks, and retrieval
//! results that flow through the ingestion and retrieval pipeline.

use serde::Serialize;

/// Which store a document (and its chunks) belongs to.
///
/// The knowledge base is shared across all clients; client documents are
/// isolated per client and never visible outside that client's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentScope {
    KnowledgeBase,
    Client(String),
}

impl DocumentScope {
    /// Storage tag: `"kb"` or `"client"`.
    pub fn as_str(&self) -> &str {
        match self {
            DocumentScope::KnowledgeBase => "kb",
            DocumentScope::Client(_) => "client",
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        match self {
            DocumentScope::KnowledgeBase => None,
            DocumentScope::Client(id) => Some(id),
        }
    }
}

/// A client (scope boundary for document isolation).
#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// A stored document: extracted text plus its owning scope.
///
/// Immutable once chunked; re-ingestion deletes and recreates its chunks.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    /// `"kb"` or `"client"`.
    pub scope: String,
    /// Set when `scope == "client"`.
    pub client_id: Option<String>,
    pub name: String,
    pub body: String,
    pub created_at: i64,
}

/// A chunk of a document's body text.
///
/// `chunk_index` is part of the stored record, not just array position —
/// storage order is not guaranteed.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Which tier a retrieved source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    KnowledgeBase,
    ClientDocument,
}

impl SourceType {
    /// Label used in the assembled context string.
    pub fn context_label(&self) -> &str {
        match self {
            SourceType::KnowledgeBase => "Knowledge Base",
            SourceType::ClientDocument => "Client Document",
        }
    }

    /// Short label used in source display lists.
    pub fn display_tag(&self) -> &str {
        match self {
            SourceType::KnowledgeBase => "KB",
            SourceType::ClientDocument => "Client",
        }
    }
}

/// A scored chunk returned from retrieval. Ephemeral — lives for a single
/// retrieval call, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedSource {
    pub source_type: SourceType,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: i64,
    pub chunk_text: String,
    pub score: f64,
}

/// Ranked sources plus the rendered context string for prompt injection.
#[derive(Debug, Clone, Serialize)]
pub struct RagContext {
    pub sources: Vec<RetrievedSource>,
    pub context: String,
}

impl RagContext {
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            context: String::new(),
        }
    }

    /// Format sources for display, e.g. `KB: RN 465 consolidada`.
    pub fn display_sources(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|s| format!("{}: {}", s.source_type.display_tag(), s.document_name))
            .collect()
    }
}
