//! Cross-encoder reranking for the privacy-mode fetch-lines path, where a
//! client asks for precomputed candidate lines to be re-scored directly
//! against the query text it sends along with the request.

use crate::error::Result;
use crate::providers::CrossEncoderProvider;
use std::sync::Arc;

/// One candidate line range plus its plaintext, supplied by the privacy
/// client itself (the server never stores this text).
#[derive(Debug, Clone)]
pub struct FetchLinesCandidate {
    pub chunk_id: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RerankedLine {
    pub chunk_id: String,
    pub score: f64,
}

pub struct CrossEncoderReranker {
    provider: Arc<dyn CrossEncoderProvider>,
}

impl CrossEncoderReranker {
    pub fn new(provider: Arc<dyn CrossEncoderProvider>) -> Self {
        Self { provider }
    }

    /// Score every candidate against `query` directly and return them
    /// best-first. Unlike the fused hybrid search path, this never
    /// normalizes or blends with a second score source — the cross-encoder
    /// output is the final ranking signal.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[FetchLinesCandidate],
    ) -> Result<Vec<RerankedLine>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let passages: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = self.provider.score_pairs(query, &passages).await?;

        let mut ranked: Vec<RerankedLine> = candidates
            .iter()
            .zip(scores)
            .map(|(c, score)| RerankedLine {
                chunk_id: c.chunk_id.clone(),
                score,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }
}
