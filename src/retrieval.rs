//! Retrieval and context assembly.
//!
//! Embeds a query once, scores stored chunks in the shared knowledge base
//! and (when a client is in scope) that client's private documents, merges
//! the two tiers, and renders the ranked chunks into a single labeled
//! context string for prompt injection.
//!
//! Pure read path: no side effects beyond the embedding call. An empty
//! store yields an empty source list and empty context string — a valid
//! state, not an error.

use anyhow::Result;

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::{DocumentScope, RagContext, RetrievedSource, SourceType};
use crate::store::{DocumentStore, ScoredChunk};

/// Separator between labeled context blocks.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

fn to_source(candidate: ScoredChunk, source_type: SourceType) -> RetrievedSource {
    RetrievedSource {
        source_type,
        document_id: candidate.document_id,
        document_name: candidate.document_name,
        chunk_index: candidate.chunk_index,
        chunk_text: candidate.chunk_text,
        score: candidate.score,
    }
}

/// Search the shared knowledge base.
pub async fn search_knowledge_base(
    store: &dyn DocumentStore,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    query: &str,
    limit: usize,
) -> Result<Vec<RetrievedSource>> {
    let query_vec = embedding::embed_query(provider, &config.embedding, query).await?;
    let candidates = store
        .vector_search(&DocumentScope::KnowledgeBase, &query_vec, limit)
        .await?;
    Ok(candidates
        .into_iter()
        .map(|c| to_source(c, SourceType::KnowledgeBase))
        .collect())
}

/// Search one client's private documents.
pub async fn search_client_documents(
    store: &dyn DocumentStore,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    query: &str,
    client_id: &str,
    limit: usize,
) -> Result<Vec<RetrievedSource>> {
    let query_vec = embedding::embed_query(provider, &config.embedding, query).await?;
    let scope = DocumentScope::Client(client_id.to_string());
    let candidates = store.vector_search(&scope, &query_vec, limit).await?;
    Ok(candidates
        .into_iter()
        .map(|c| to_source(c, SourceType::ClientDocument))
        .collect())
}

/// Assemble the full grounding context for a query.
///
/// Takes up to `retrieval.kb_limit` knowledge-base sources and, when a
/// client is in scope, up to `retrieval.client_limit` client sources; merges
/// both lists sorted by descending similarity (stable — ties keep scan
/// order, knowledge base first) and truncates to `retrieval.max_sources`.
pub async fn search_full_context(
    store: &dyn DocumentStore,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    query: &str,
    client_id: Option<&str>,
) -> Result<RagContext> {
    if query.trim().is_empty() {
        return Ok(RagContext::empty());
    }

    // Embed once; both tiers score against the same vector.
    let query_vec = embedding::embed_query(provider, &config.embedding, query).await?;

    let mut sources: Vec<RetrievedSource> = store
        .vector_search(
            &DocumentScope::KnowledgeBase,
            &query_vec,
            config.retrieval.kb_limit,
        )
        .await?
        .into_iter()
        .map(|c| to_source(c, SourceType::KnowledgeBase))
        .collect();

    if let Some(id) = client_id {
        let scope = DocumentScope::Client(id.to_string());
        sources.extend(
            store
                .vector_search(&scope, &query_vec, config.retrieval.client_limit)
                .await?
                .into_iter()
                .map(|c| to_source(c, SourceType::ClientDocument)),
        );
    }

    sources.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sources.truncate(config.retrieval.max_sources);

    let context = render_context(&sources);

    Ok(RagContext { sources, context })
}

/// CLI entry point: print ranked sources and the assembled context.
pub async fn run_query(
    store: &dyn DocumentStore,
    config: &Config,
    query: &str,
    client_id: Option<&str>,
) -> Result<()> {
    if let Some(id) = client_id {
        if store.get_client(id).await?.is_none() {
            anyhow::bail!("unknown client: {}", id);
        }
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let ctx = search_full_context(store, provider.as_ref(), config, query, client_id).await?;

    if ctx.sources.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, source) in ctx.sources.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} / {} (chunk {})",
            i + 1,
            source.score,
            source.source_type.display_tag(),
            source.document_name,
            source.chunk_index
        );
        let excerpt: String = source.chunk_text.chars().take(120).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
    }
    println!();
    println!("--- context ---");
    println!("{}", ctx.context);

    Ok(())
}

/// Render ranked sources as labeled blocks:
/// `[<tier>] <document name>:\n<chunk text>`, blank-line separated.
pub fn render_context(sources: &[RetrievedSource]) -> String {
    let blocks: Vec<String> = sources
        .iter()
        .map(|s| {
            format!(
                "[{}] {}:\n{}",
                s.source_type.context_label(),
                s.document_name,
                s.chunk_text
            )
        })
        .collect();
    blocks.join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::hash_embedding;
    use crate::models::{Chunk, Document};
    use crate::store::memory::MemoryStore;

    fn test_config() -> Config {
        let mut cfg: Config = toml::from_str("[db]\npath = \"/tmp/unused.sqlite\"\n").unwrap();
        cfg.embedding.dims = 64;
        cfg
    }

    async fn seed_document(
        store: &MemoryStore,
        scope: &str,
        client_id: Option<&str>,
        name: &str,
        chunks: &[&str],
    ) {
        let doc = Document {
            id: format!("{}-{}", scope, name),
            scope: scope.to_string(),
            client_id: client_id.map(|s| s.to_string()),
            name: name.to_string(),
            body: chunks.join(" "),
            created_at: 0,
        };
        let doc_id = store.upsert_document(&doc).await.unwrap();

        let records: Vec<Chunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                id: format!("{}-c{}", doc_id, i),
                document_id: doc_id.clone(),
                chunk_index: i as i64,
                text: text.to_string(),
                hash: format!("h{}", i),
            })
            .collect();
        store.replace_chunks(&doc_id, &records).await.unwrap();

        for c in &records {
            let vec = hash_embedding(&c.text, 64);
            store
                .upsert_embedding(&c.id, &doc_id, &vec, "hash", 64, &c.hash)
                .await
                .unwrap();
        }
    }

    fn provider() -> Box<dyn EmbeddingProvider> {
        let cfg = test_config();
        crate::embedding::create_provider(&cfg.embedding).unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_context() {
        let store = MemoryStore::new();
        let cfg = test_config();
        let ctx = search_full_context(&store, provider().as_ref(), &cfg, "carência", None)
            .await
            .unwrap();
        assert!(ctx.sources.is_empty());
        assert_eq!(ctx.context, "");
    }

    #[tokio::test]
    async fn test_empty_query_yields_empty_context() {
        let store = MemoryStore::new();
        let cfg = test_config();
        let ctx = search_full_context(&store, provider().as_ref(), &cfg, "   ", None)
            .await
            .unwrap();
        assert!(ctx.sources.is_empty());
    }

    #[tokio::test]
    async fn test_scores_non_increasing() {
        let store = MemoryStore::new();
        let cfg = test_config();
        seed_document(
            &store,
            "kb",
            None,
            "RN 465",
            &[
                "Cobertura obrigatória de procedimentos.",
                "Prazos máximos de atendimento.",
                "Diretrizes de utilização.",
            ],
        )
        .await;

        let ctx = search_full_context(
            &store,
            provider().as_ref(),
            &cfg,
            "Prazos máximos de atendimento.",
            None,
        )
        .await
        .unwrap();

        assert!(!ctx.sources.is_empty());
        for pair in ctx.sources.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_exact_chunk_text_ranks_first() {
        let store = MemoryStore::new();
        let cfg = test_config();
        seed_document(
            &store,
            "kb",
            None,
            "Lei 9.656",
            &[
                "Planos individuais têm reajuste regulado.",
                "Carência máxima de cento e oitenta dias.",
                "Portabilidade de carências é garantida.",
            ],
        )
        .await;

        let ctx = search_full_context(
            &store,
            provider().as_ref(),
            &cfg,
            "Carência máxima de cento e oitenta dias.",
            None,
        )
        .await
        .unwrap();

        // Identical text ⇒ identical hash vector ⇒ similarity 1.
        assert_eq!(
            ctx.sources[0].chunk_text,
            "Carência máxima de cento e oitenta dias."
        );
        assert!((ctx.sources[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_client_isolation() {
        let store = MemoryStore::new();
        let cfg = test_config();
        seed_document(
            &store,
            "client",
            Some("client-a"),
            "Contrato Empresa A",
            &["Coparticipação de trinta por cento."],
        )
        .await;
        seed_document(
            &store,
            "client",
            Some("client-b"),
            "Contrato Empresa B",
            &["Rede credenciada nacional."],
        )
        .await;

        let ctx = search_full_context(
            &store,
            provider().as_ref(),
            &cfg,
            "coparticipação",
            Some("client-b"),
        )
        .await
        .unwrap();

        for s in &ctx.sources {
            assert_eq!(s.document_name, "Contrato Empresa B");
        }
    }

    #[tokio::test]
    async fn test_combined_limit_and_merge() {
        let store = MemoryStore::new();
        let cfg = test_config();
        seed_document(
            &store,
            "kb",
            None,
            "Base normativa",
            &["um.", "dois.", "três.", "quatro."],
        )
        .await;
        seed_document(
            &store,
            "client",
            Some("client-a"),
            "Contrato",
            &["cinco.", "seis.", "sete."],
        )
        .await;

        let ctx = search_full_context(
            &store,
            provider().as_ref(),
            &cfg,
            "cobertura",
            Some("client-a"),
        )
        .await
        .unwrap();

        // 3 KB + 2 client, capped at 5 combined.
        assert_eq!(ctx.sources.len(), 5);
        let kb_count = ctx
            .sources
            .iter()
            .filter(|s| s.source_type == SourceType::KnowledgeBase)
            .count();
        assert!(kb_count <= 3);
    }

    #[test]
    fn test_context_rendering_format() {
        let sources = vec![RetrievedSource {
            source_type: SourceType::KnowledgeBase,
            document_id: "d1".into(),
            document_name: "RN 465".into(),
            chunk_index: 0,
            chunk_text: "Cobertura obrigatória.".into(),
            score: 0.9,
        }];
        let ctx = render_context(&sources);
        assert_eq!(ctx, "[Knowledge Base] RN 465:\nCobertura obrigatória.");

        let two = vec![
            sources[0].clone(),
            RetrievedSource {
                source_type: SourceType::ClientDocument,
                document_id: "d2".into(),
                document_name: "Contrato".into(),
                chunk_index: 1,
                chunk_text: "Cláusula 14.".into(),
                score: 0.5,
            },
        ];
        let rendered = render_context(&two);
        assert!(rendered.contains("\n\n---\n\n"));
        assert!(rendered.contains("[Client Document] Contrato:\nCláusula 14."));
    }
}
