//! In-memory [`DocumentStore`] implementation for unit tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Vector search is the same brute-force cosine scan as the SQLite backend.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, Client, Document, DocumentScope};

use super::{DocumentStore, PendingChunk, ScoredChunk};

struct StoredVector {
    chunk_id: String,
    document_id: String,
    vector: Vec<f32>,
    model: String,
    hash: String,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    clients: RwLock<Vec<Client>>,
    docs: RwLock<Vec<Document>>,
    chunks: RwLock<Vec<Chunk>>,
    vectors: RwLock<Vec<StoredVector>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn scope_matches(doc: &Document, scope: &DocumentScope) -> bool {
    doc.scope == scope.as_str() && doc.client_id.as_deref() == scope.client_id()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert_client(&self, client: &Client) -> Result<()> {
        let mut clients = self.clients.write().unwrap();
        if let Some(existing) = clients.iter_mut().find(|c| c.id == client.id) {
            existing.name = client.name.clone();
        } else {
            clients.push(client.clone());
        }
        Ok(())
    }

    async fn get_client(&self, id: &str) -> Result<Option<Client>> {
        let clients = self.clients.read().unwrap();
        Ok(clients.iter().find(|c| c.id == id).cloned())
    }

    async fn list_clients(&self) -> Result<Vec<Client>> {
        Ok(self.clients.read().unwrap().clone())
    }

    async fn upsert_document(&self, doc: &Document) -> Result<String> {
        let mut docs = self.docs.write().unwrap();
        if let Some(existing) = docs.iter_mut().find(|d| {
            d.scope == doc.scope && d.client_id == doc.client_id && d.name == doc.name
        }) {
            existing.body = doc.body.clone();
            existing.created_at = doc.created_at;
            Ok(existing.id.clone())
        } else {
            docs.push(doc.clone());
            Ok(doc.id.clone())
        }
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(&self, scope: &DocumentScope) -> Result<Vec<Document>> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .iter()
            .filter(|d| scope_matches(d, scope))
            .cloned()
            .collect())
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        {
            let mut stored = self.chunks.write().unwrap();
            stored.retain(|c| c.document_id != document_id);
            stored.extend(chunks.iter().cloned());
        }
        let mut vectors = self.vectors.write().unwrap();
        vectors.retain(|v| v.document_id != document_id);
        Ok(())
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let stored = self.chunks.read().unwrap();
        let mut out: Vec<Chunk> = stored
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.chunk_index);
        Ok(out)
    }

    async fn upsert_embedding(
        &self,
        chunk_id: &str,
        document_id: &str,
        vector: &[f32],
        model: &str,
        _dims: usize,
        content_hash: &str,
    ) -> Result<()> {
        let mut vectors = self.vectors.write().unwrap();
        vectors.retain(|v| v.chunk_id != chunk_id);
        vectors.push(StoredVector {
            chunk_id: chunk_id.to_string(),
            document_id: document_id.to_string(),
            vector: vector.to_vec(),
            model: model.to_string(),
            hash: content_hash.to_string(),
        });
        Ok(())
    }

    async fn vector_search(
        &self,
        scope: &DocumentScope,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let docs = self.docs.read().unwrap();
        let chunks = self.chunks.read().unwrap();
        let vectors = self.vectors.read().unwrap();

        let mut candidates: Vec<ScoredChunk> = Vec::new();
        for sv in vectors.iter() {
            let doc = match docs.iter().find(|d| d.id == sv.document_id) {
                Some(d) if scope_matches(d, scope) => d,
                _ => continue,
            };
            let chunk = match chunks.iter().find(|c| c.id == sv.chunk_id) {
                Some(c) => c,
                None => continue,
            };
            candidates.push(ScoredChunk {
                document_id: doc.id.clone(),
                document_name: doc.name.clone(),
                chunk_index: chunk.chunk_index,
                chunk_text: chunk.text.clone(),
                score: cosine_similarity(query_vec, &sv.vector) as f64,
            });
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn pending_chunks(
        &self,
        model: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PendingChunk>> {
        let chunks = self.chunks.read().unwrap();
        let vectors = self.vectors.read().unwrap();
        let embedded: HashMap<&str, &str> = vectors
            .iter()
            .filter(|v| v.model == model)
            .map(|v| (v.chunk_id.as_str(), v.hash.as_str()))
            .collect();

        let mut out: Vec<PendingChunk> = chunks
            .iter()
            .filter(|c| embedded.get(c.id.as_str()).copied() != Some(c.hash.as_str()))
            .map(|c| PendingChunk {
                chunk_id: c.id.clone(),
                document_id: c.document_id.clone(),
                text: c.text.clone(),
                text_hash: c.hash.clone(),
            })
            .collect();

        if let Some(lim) = limit {
            out.truncate(lim);
        }
        Ok(out)
    }

    async fn clear_embeddings(&self) -> Result<()> {
        self.vectors.write().unwrap().clear();
        Ok(())
    }
}
