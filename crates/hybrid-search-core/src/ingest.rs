//! Ingestion write path: chunk upsert (always vector, lexical only for
//! non-privacy repos) and the resumable-upload commit that feeds it from a
//! blob fetched by key.

use crate::blob::{decode_lossy, BlobStore};
use crate::cache::EmbeddingCache;
use crate::error::{AppError, Result};
use crate::model::{Chunk, ChunkPayload};
use crate::store::{LexicalIndex, VectorIndex, VectorPoint};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome counts for an ingestion call, echoed back to the client as
/// `{status, qdrant, opensearch}`.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub vector_count: usize,
    pub lexical_count: usize,
}

pub struct IngestionHandler {
    vector: Arc<dyn VectorIndex>,
    lexical: Arc<dyn LexicalIndex>,
    embeddings: Arc<EmbeddingCache>,
    blob: Arc<dyn BlobStore>,
    privacy_repo_ids: HashSet<String>,
}

fn payload_for(chunk: &Chunk, text: Option<String>) -> ChunkPayload {
    ChunkPayload {
        chunk_id: chunk.chunk_id.clone(),
        repo_id: chunk.repo_id.clone(),
        path_tokens: chunk.path_tokens.clone(),
        rel_path: chunk.rel_path.clone(),
        lang: chunk.lang.clone(),
        line_start: chunk.line_start,
        line_end: chunk.line_end,
        text,
    }
}

impl IngestionHandler {
    pub fn new(
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
        embeddings: Arc<EmbeddingCache>,
        blob: Arc<dyn BlobStore>,
        privacy_repo_ids: HashSet<String>,
    ) -> Self {
        Self {
            vector,
            lexical,
            embeddings,
            blob,
            privacy_repo_ids,
        }
    }

    /// Upsert a batch of already-assembled chunks: every chunk goes to the
    /// vector store; non-privacy chunks with text additionally go to the
    /// lexical store, unless their repo is privacy-mode-only at the tenant
    /// level.
    pub async fn ingest_chunks(&self, tenant_id: &str, chunks: &[Chunk]) -> Result<IngestOutcome> {
        let mut vector_points = Vec::with_capacity(chunks.len());
        let mut lexical_docs = Vec::new();

        for chunk in chunks {
            chunk
                .validate()
                .map_err(AppError::BadRequest)?;

            // Whether a precomputed vector is required depends solely on the
            // chunk's own privacy flag; whether we also write a lexical
            // document depends on that flag OR the tenant's repo-level
            // privacy list. The two are independent: a non-privacy chunk
            // uploaded to a privacy repo still gets embedded from its text,
            // it just never reaches the lexical index.
            let skip_lexical = chunk.privacy_mode || self.privacy_repo_ids.contains(&chunk.repo_id);

            let vector = if chunk.privacy_mode {
                chunk
                    .vector
                    .clone()
                    .ok_or_else(|| AppError::BadRequest(format!(
                        "chunk {}: privacy_mode requires a precomputed vector",
                        chunk.chunk_id
                    )))?
            } else {
                let text = chunk.text.as_deref().ok_or_else(|| {
                    AppError::BadRequest(format!("chunk {}: non-privacy chunk requires text", chunk.chunk_id))
                })?;
                self.embeddings.encode(text).await?
            };

            // The vector payload never carries plaintext; only the lexical
            // index stores `text`.
            let payload = payload_for(chunk, None);

            vector_points.push(VectorPoint {
                chunk_id: chunk.chunk_id.clone(),
                vector,
                payload,
            });

            if !skip_lexical {
                if let Some(text) = chunk.text.clone() {
                    if !text.is_empty() {
                        lexical_docs.push(payload_for(chunk, Some(text)));
                    }
                }
            }
        }

        if let Some(first) = vector_points.first() {
            self.vector.ensure_collection(tenant_id, first.vector.len()).await?;
        }
        self.vector.upsert(tenant_id, &vector_points).await?;

        if !lexical_docs.is_empty() {
            self.lexical.ensure_index(tenant_id).await?;
            self.lexical.bulk_upsert(tenant_id, &lexical_docs).await?;
        }

        Ok(IngestOutcome {
            vector_count: vector_points.len(),
            lexical_count: lexical_docs.len(),
        })
    }

    /// Commit a resumable upload: fetch the object `tus_key` points at,
    /// decode it as UTF-8 (lossily), and ingest it through the non-privacy
    /// text path.
    pub async fn commit_tus(&self, tenant_id: &str, repo_id: &str, mut chunk: Chunk, tus_key: &str) -> Result<String> {
        let bytes = self.blob.get(tus_key).await?;
        chunk.tenant_id = tenant_id.to_string();
        chunk.repo_id = repo_id.to_string();
        chunk.privacy_mode = false;
        chunk.text = Some(decode_lossy(&bytes));
        chunk.vector = None;

        self.ingest_chunks(tenant_id, std::slice::from_ref(&chunk)).await?;
        Ok(chunk.chunk_id)
    }
}
