//! SQLite [`DocumentStore`] backend over sqlx.
//!
//! Knowledge-base documents are stored with `client_id = ''`; scoping is
//! enforced in the queries, never left to callers.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity};
use crate::models::{Chunk, Client, Document, DocumentScope};

use super::{DocumentStore, PendingChunk, ScoredChunk};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn client_id_column(doc: &Document) -> &str {
    doc.client_id.as_deref().unwrap_or("")
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    let client_id: String = row.get("client_id");
    Document {
        id: row.get("id"),
        scope: row.get("scope"),
        client_id: if client_id.is_empty() {
            None
        } else {
            Some(client_id)
        },
        name: row.get("name"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn upsert_client(&self, client: &Client) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, name, created_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(client.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_client(&self, id: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT id, name, created_at FROM clients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Client {
            id: r.get("id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        }))
    }

    async fn list_clients(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM clients ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| Client {
                id: r.get("id"),
                name: r.get("name"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn upsert_document(&self, doc: &Document) -> Result<String> {
        let existing_id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE scope = ? AND client_id = ? AND name = ?",
        )
        .bind(&doc.scope)
        .bind(client_id_column(doc))
        .bind(&doc.name)
        .fetch_optional(&self.pool)
        .await?;

        let doc_id = existing_id.unwrap_or_else(|| doc.id.clone());

        sqlx::query(
            r#"
            INSERT INTO documents (id, scope, client_id, name, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(scope, client_id, name) DO UPDATE SET
                body = excluded.body,
                created_at = excluded.created_at
            "#,
        )
        .bind(&doc_id)
        .bind(&doc.scope)
        .bind(client_id_column(doc))
        .bind(&doc.name)
        .bind(&doc.body)
        .bind(doc.created_at)
        .execute(&self.pool)
        .await?;

        Ok(doc_id)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, scope, client_id, name, body, created_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_document))
    }

    async fn list_documents(&self, scope: &DocumentScope) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, scope, client_id, name, body, created_at
            FROM documents
            WHERE scope = ? AND client_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(scope.as_str())
        .bind(scope.client_id().unwrap_or(""))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?)",
        )
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?)",
        )
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, chunk_index, text, hash
            FROM chunks
            WHERE document_id = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Chunk {
                id: r.get("id"),
                document_id: r.get("document_id"),
                chunk_index: r.get("chunk_index"),
                text: r.get("text"),
                hash: r.get("hash"),
            })
            .collect())
    }

    async fn upsert_embedding(
        &self,
        chunk_id: &str,
        document_id: &str,
        vector: &[f32],
        model: &str,
        dims: usize,
        content_hash: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let blob = crate::embedding::vec_to_blob(vector);

        sqlx::query(
            r#"
            INSERT INTO embeddings (chunk_id, model, dims, created_at, hash)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                created_at = excluded.created_at,
                hash = excluded.hash
            "#,
        )
        .bind(chunk_id)
        .bind(model)
        .bind(dims as i64)
        .bind(now)
        .bind(content_hash)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (chunk_id, document_id, embedding)
            VALUES (?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                document_id = excluded.document_id,
                embedding = excluded.embedding
            "#,
        )
        .bind(chunk_id)
        .bind(document_id)
        .bind(blob)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn vector_search(
        &self,
        scope: &DocumentScope,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        // Scoping happens here, in the join — callers cannot widen it.
        let rows = sqlx::query(
            r#"
            SELECT cv.embedding, c.chunk_index, c.text, d.id AS document_id, d.name
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            JOIN documents d ON d.id = cv.document_id
            WHERE d.scope = ? AND d.client_id = ?
            ORDER BY d.created_at, d.id, c.chunk_index
            "#,
        )
        .bind(scope.as_str())
        .bind(scope.client_id().unwrap_or(""))
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let score = cosine_similarity(query_vec, &vec) as f64;
                ScoredChunk {
                    document_id: row.get("document_id"),
                    document_name: row.get("name"),
                    chunk_index: row.get("chunk_index"),
                    chunk_text: row.get("text"),
                    score,
                }
            })
            .collect();

        // Stable sort: equal scores keep scan order.
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
        let limit_val = limit.unwrap_or(usize::MAX) as i64;

        let rows = sqlx::query(
            r#"
            SELECT c.id AS chunk_id, c.document_id, c.text, c.hash
            FROM chunks c
            LEFT JOIN embeddings e ON e.chunk_id = c.id AND e.model = ?
            WHERE e.chunk_id IS NULL OR e.hash != c.hash
            ORDER BY c.document_id, c.chunk_index
            LIMIT ?
            "#,
        )
        .bind(model)
        .bind(limit_val)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PendingChunk {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                text: row.get("text"),
                text_hash: row.get("hash"),
            })
            .collect())
    }

    async fn clear_embeddings(&self) -> Result<()> {
        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM embeddings")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hash_embedding;
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    // One connection: each :memory: connection is its own database.
    async fn test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn doc(scope: &str, client_id: Option<&str>, name: &str) -> Document {
        Document {
            id: Uuid::new_v4().to_string(),
            scope: scope.to_string(),
            client_id: client_id.map(|s| s.to_string()),
            name: name.to_string(),
            body: "corpo do documento".to_string(),
            created_at: 1,
        }
    }

    fn chunk(doc_id: &str, index: i64, text: &str) -> Chunk {
        Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: doc_id.to_string(),
            chunk_index: index,
            text: text.to_string(),
            hash: format!("hash-{}", index),
        }
    }

    #[tokio::test]
    async fn test_client_roundtrip() {
        let store = test_store().await;
        let client = Client {
            id: "c1".into(),
            name: "Empresa".into(),
            created_at: 1,
        };
        store.upsert_client(&client).await.unwrap();
        let got = store.get_client("c1").await.unwrap().unwrap();
        assert_eq!(got.name, "Empresa");
        assert!(store.get_client("missing").await.unwrap().is_none());
        assert_eq!(store.list_clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_document_upsert_keyed_by_scope_and_name() {
        let store = test_store().await;

        let first = store.upsert_document(&doc("kb", None, "rn-465")).await.unwrap();
        let second = store.upsert_document(&doc("kb", None, "rn-465")).await.unwrap();
        assert_eq!(first, second, "same (scope, name) must keep the same id");

        let other = store.upsert_document(&doc("kb", None, "rn-466")).await.unwrap();
        assert_ne!(first, other);

        let got = store.get_document(&first).await.unwrap().unwrap();
        assert_eq!(got.name, "rn-465");
        assert_eq!(got.client_id, None);

        let listed = store
            .list_documents(&DocumentScope::KnowledgeBase)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_same_name_different_clients_are_distinct() {
        let store = test_store().await;
        let a = store
            .upsert_document(&doc("client", Some("c1"), "contrato"))
            .await
            .unwrap();
        let b = store
            .upsert_document(&doc("client", Some("c2"), "contrato"))
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_replace_chunks_is_wholesale() {
        let store = test_store().await;
        let doc_id = store.upsert_document(&doc("kb", None, "d")).await.unwrap();

        let first = vec![chunk(&doc_id, 0, "um"), chunk(&doc_id, 1, "dois")];
        store.replace_chunks(&doc_id, &first).await.unwrap();
        for c in &first {
            let v = hash_embedding(&c.text, 8);
            store
                .upsert_embedding(&c.id, &doc_id, &v, "hash", 8, &c.hash)
                .await
                .unwrap();
        }

        let second = vec![chunk(&doc_id, 0, "novo")];
        store.replace_chunks(&doc_id, &second).await.unwrap();

        let chunks = store.list_chunks(&doc_id).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "novo");

        // Old vectors went with the old chunks.
        let results = store
            .vector_search(&DocumentScope::KnowledgeBase, &hash_embedding("um", 8), 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_vector_search_scoping() {
        let store = test_store().await;

        let kb = store.upsert_document(&doc("kb", None, "base")).await.unwrap();
        let ca = store
            .upsert_document(&doc("client", Some("c1"), "contrato-a"))
            .await
            .unwrap();
        let cb = store
            .upsert_document(&doc("client", Some("c2"), "contrato-b"))
            .await
            .unwrap();

        for (doc_id, text) in [(&kb, "texto base"), (&ca, "texto a"), (&cb, "texto b")] {
            let c = chunk(doc_id, 0, text);
            store.replace_chunks(doc_id, std::slice::from_ref(&c)).await.unwrap();
            let v = hash_embedding(text, 8);
            store
                .upsert_embedding(&c.id, doc_id, &v, "hash", 8, &c.hash)
                .await
                .unwrap();
        }

        let query = hash_embedding("texto a", 8);

        let kb_results = store
            .vector_search(&DocumentScope::KnowledgeBase, &query, 10)
            .await
            .unwrap();
        assert_eq!(kb_results.len(), 1);
        assert_eq!(kb_results[0].document_name, "base");

        let c1_results = store
            .vector_search(&DocumentScope::Client("c1".into()), &query, 10)
            .await
            .unwrap();
        assert_eq!(c1_results.len(), 1);
        assert_eq!(c1_results[0].document_name, "contrato-a");
        assert!((c1_results[0].score - 1.0).abs() < 1e-6);

        let c2_results = store
            .vector_search(&DocumentScope::Client("c2".into()), &query, 10)
            .await
            .unwrap();
        assert_eq!(c2_results.len(), 1);
        assert_eq!(c2_results[0].document_name, "contrato-b");
    }

    #[tokio::test]
    async fn test_pending_and_clear_embeddings() {
        let store = test_store().await;
        let doc_id = store.upsert_document(&doc("kb", None, "d")).await.unwrap();
        let chunks = vec![chunk(&doc_id, 0, "um"), chunk(&doc_id, 1, "dois")];
        store.replace_chunks(&doc_id, &chunks).await.unwrap();

        // Nothing embedded yet: both pending.
        let pending = store.pending_chunks("hash", None).await.unwrap();
        assert_eq!(pending.len(), 2);

        let v = hash_embedding("um", 8);
        store
            .upsert_embedding(&chunks[0].id, &doc_id, &v, "hash", 8, &chunks[0].hash)
            .await
            .unwrap();
        let pending = store.pending_chunks("hash", None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].text, "dois");

        // A different model sees everything as pending.
        let pending = store.pending_chunks("other-model", None).await.unwrap();
        assert_eq!(pending.len(), 2);

        store.clear_embeddings().await.unwrap();
        let pending = store.pending_chunks("hash", None).await.unwrap();
        assert_eq!(pending.len(), 2);
    }
}
