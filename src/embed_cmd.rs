//! Embedding backfill commands.
//!
//! `embed pending` finds chunks without a vector (or whose text changed
//! since embedding) and fills them in; `embed rebuild` clears everything
//! and regenerates. Useful after switching providers or dimensions, and to
//! recover from ingestion runs whose embedding step failed partway.

use anyhow::Result;

use crate::config::Config;
use crate::embedding;
use crate::store::DocumentStore;

/// Embed chunks that are missing or have stale embeddings.
pub async fn run_embed_pending(
    store: &dyn DocumentStore,
    config: &Config,
    limit: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();

    let pending = store.pending_chunks(&model_name, limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  chunks needing embeddings: {}", pending.len());
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all chunks up to date");
        return Ok(());
    }

    let total = pending.len();
    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in pending.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        match embedding::embed_texts(provider.as_ref(), &config.embedding, &texts).await {
            Ok(vectors) => {
                for (item, vec) in batch.iter().zip(vectors.iter()) {
                    store
                        .upsert_embedding(
                            &item.chunk_id,
                            &item.document_id,
                            vec,
                            &model_name,
                            provider.dims(),
                            &item.text_hash,
                        )
                        .await?;
                    embedded += 1;
                }
            }
            Err(e) => {
                tracing::warn!("embedding batch failed: {e:#}");
                failed += batch.len() as u64;
            }
        }
    }

    println!("embed pending");
    println!("  total pending: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    Ok(())
}

/// Delete all embeddings and regenerate for all chunks.
pub async fn run_embed_rebuild(store: &dyn DocumentStore, config: &Config) -> Result<()> {
    store.clear_embeddings().await?;
    println!("embed rebuild — cleared existing embeddings");

    run_embed_pending(store, config, None, false).await
}
