//! Document ingestion: the chunk-and-embed pipeline.
//!
//! A document is upserted, its previous chunks are replaced wholesale
//! (idempotent re-ingestion), and each chunk is embedded in index order.
//! Chunk replacement is transactional per document; embedding is not — a
//! provider failure aborts the remaining chunks of that call and leaves
//! them pending, to be backfilled by `embed pending`.

use anyhow::{bail, Result};
use std::path::Path;
use uuid::Uuid;

use crate::chunk::make_chunks;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::extract;
use crate::models::{Document, DocumentScope};
use crate::store::DocumentStore;

/// Outcome of one ingestion call.
#[derive(Debug)]
pub struct IngestStats {
    pub document_id: String,
    pub chunks_written: usize,
    pub embedded: usize,
    pub pending: usize,
}

/// Ingest a document's extracted text into the given scope.
///
/// Re-ingesting the same `(scope, name)` replaces the document's chunks
/// rather than appending. Other documents are never touched.
pub async fn ingest_document(
    store: &dyn DocumentStore,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    scope: DocumentScope,
    name: &str,
    body: &str,
) -> Result<IngestStats> {
    if name.trim().is_empty() {
        bail!("document name must not be empty");
    }
    if body.trim().is_empty() {
        bail!("document body must not be empty");
    }

    if let Some(client_id) = scope.client_id() {
        if store.get_client(client_id).await?.is_none() {
            bail!("unknown client: {}", client_id);
        }
    }

    let doc = Document {
        id: Uuid::new_v4().to_string(),
        scope: scope.as_str().to_string(),
        client_id: scope.client_id().map(|s| s.to_string()),
        name: name.to_string(),
        body: body.to_string(),
        created_at: chrono::Utc::now().timestamp(),
    };

    let doc_id = store.upsert_document(&doc).await?;
    let chunks = make_chunks(&doc_id, body, config.chunking.chunk_size, config.chunking.overlap);
    store.replace_chunks(&doc_id, &chunks).await?;

    let model_name = provider.model_name().to_string();
    let mut embedded = 0usize;

    // Index order, batched. A failed batch aborts the rest of this call;
    // the chunks stay stored with their embeddings pending.
    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match embedding::embed_texts(provider, &config.embedding, &texts).await {
            Ok(vectors) => {
                for (chunk, vec) in batch.iter().zip(vectors.iter()) {
                    store
                        .upsert_embedding(
                            &chunk.id,
                            &doc_id,
                            vec,
                            &model_name,
                            provider.dims(),
                            &chunk.hash,
                        )
                        .await?;
                    embedded += 1;
                }
            }
            Err(e) => {
                tracing::warn!(
                    document = %name,
                    embedded,
                    total = chunks.len(),
                    "embedding failed, aborting remaining chunks: {e:#}"
                );
                break;
            }
        }
    }

    tracing::info!(
        document = %name,
        scope = scope.as_str(),
        chunks = chunks.len(),
        embedded,
        "document processed"
    );

    Ok(IngestStats {
        document_id: doc_id,
        chunks_written: chunks.len(),
        embedded,
        pending: chunks.len() - embedded,
    })
}

/// CLI entry point: extract text from a file and ingest it.
///
/// `name` defaults to the file stem when not given.
pub async fn run_ingest(
    store: &dyn DocumentStore,
    config: &Config,
    scope: DocumentScope,
    path: &Path,
    name: Option<String>,
) -> Result<()> {
    let body = extract::extract_file(path)
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;

    let name = name.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string()
    });

    let provider = embedding::create_provider(&config.embedding)?;
    let stats = ingest_document(store, provider.as_ref(), config, scope, &name, &body).await?;

    println!("ingest {}", name);
    println!("  document id: {}", stats.document_id);
    println!("  chunks written: {}", stats.chunks_written);
    println!("  embeddings written: {}", stats.embedded);
    if stats.pending > 0 {
        println!("  embeddings pending: {}", stats.pending);
    }
    println!("ok");

    Ok(())
}
