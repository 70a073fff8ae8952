//! Storage abstraction for the two-tier document store.
//!
//! The [`DocumentStore`] trait defines every persistence operation the
//! ingestion and retrieval pipeline needs, enabling pluggable backends
//! (SQLite in production, in-memory for tests). Vector search is a linear
//! cosine scan in both backends; keeping it behind this trait means an
//! indexed backend can be substituted without touching retrieval.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Client, Document, DocumentScope};

pub use sqlite::SqliteStore;

/// A scored chunk returned from a scoped vector search.
///
/// Carries enough information to build a retrieval source without an
/// additional document lookup.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: i64,
    pub chunk_text: String,
    pub score: f64,
}

/// A chunk that has no embedding yet, or whose text changed since it was
/// last embedded.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub text_hash: String,
}

/// Abstract storage backend for clients, documents, chunks, and vectors.
///
/// # Isolation invariant
///
/// [`vector_search`](DocumentStore::vector_search) scoped to one client must
/// never return chunks belonging to the knowledge base or to another client;
/// the knowledge-base scope must never return client chunks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or update a client.
    async fn upsert_client(&self, client: &Client) -> Result<()>;

    /// Retrieve a client by ID.
    async fn get_client(&self, id: &str) -> Result<Option<Client>>;

    /// List all clients, oldest first.
    async fn list_clients(&self) -> Result<Vec<Client>>;

    /// Insert or update a document, keyed by `(scope, client_id, name)`.
    ///
    /// Returns the document ID (existing or newly assigned), so repeated
    /// ingestion of the same document replaces rather than appends.
    async fn upsert_document(&self, doc: &Document) -> Result<String>;

    /// Retrieve a document by ID.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// List documents in a scope, oldest first.
    async fn list_documents(&self, scope: &DocumentScope) -> Result<Vec<Document>>;

    /// Atomically delete all chunks (and their vectors) for a document and
    /// insert the given replacement set.
    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()>;

    /// List a document's chunks in index order.
    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Store or update the embedding vector for a chunk.
    async fn upsert_embedding(
        &self,
        chunk_id: &str,
        document_id: &str,
        vector: &[f32],
        model: &str,
        dims: usize,
        content_hash: &str,
    ) -> Result<()>;

    /// Score every stored vector in the given scope against `query_vec`
    /// (cosine similarity), sort descending with scan order breaking ties,
    /// and return the top `limit` chunks.
    async fn vector_search(
        &self,
        scope: &DocumentScope,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Find chunks missing an embedding for `model`, or whose text hash no
    /// longer matches the stored embedding hash.
    async fn pending_chunks(&self, model: &str, limit: Option<usize>)
        -> Result<Vec<PendingChunk>>;

    /// Delete every stored embedding (used by `embed rebuild`).
    async fn clear_embeddings(&self) -> Result<()>;
}
