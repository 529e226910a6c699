//! Hybrid search pipeline: embed the query, fan out to both backends, fuse
//! their scores, optionally re-sort with a learned ranker.

use crate::error::Result;
use crate::fuse::{fuse, normalize, rrf_fusion};
use crate::model::{ChunkPayload, DebugRecord, SearchHit};
use crate::providers::Embedder;
use crate::ranker::LearnedRanker;
use crate::store::{LexicalIndex, QueryFilters, VectorIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Per-query options beyond the mandatory tenant/repo/query triple.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top_k: Option<usize>,
    pub lang: Option<String>,
    pub dir_hint: Option<String>,
    pub exclude_tests: bool,
    pub privacy_mode: bool,
    /// Effective fusion weights for this request (A/B variant or control).
    /// Passed explicitly rather than read from shared engine state, so
    /// concurrent requests in different buckets never race on a mutable
    /// alpha/beta.
    pub alpha: f64,
    pub beta: f64,
}

pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub debug: Vec<DebugRecord>,
}

/// How many candidates the engine retains before any reranking: at least
/// 30, or the requested `top_k` if larger.
const MIN_RERANK_POOL: usize = 30;

pub struct HybridSearchEngine {
    vector: Arc<dyn VectorIndex>,
    lexical: Arc<dyn LexicalIndex>,
    embedder: Arc<dyn Embedder>,
    ranker: Arc<dyn LearnedRanker>,
    top_k_vector: usize,
    top_k_lexical: usize,
    default_top_k: usize,
    rrf_k: f64,
}

impl HybridSearchEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
        embedder: Arc<dyn Embedder>,
        ranker: Arc<dyn LearnedRanker>,
        top_k_vector: usize,
        top_k_lexical: usize,
        default_top_k: usize,
        rrf_k: f64,
    ) -> Self {
        Self {
            vector,
            lexical,
            embedder,
            ranker,
            top_k_vector,
            top_k_lexical,
            default_top_k,
            rrf_k,
        }
    }

    #[instrument(skip(self, options), fields(tenant_id, repo_id, privacy_mode = options.privacy_mode))]
    pub async fn search_with_debug(
        &self,
        tenant_id: &str,
        repo_id: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome> {
        let top_k = options.top_k.unwrap_or(self.default_top_k);
        let qvec = self.embedder.embed(query).await?;

        let filters = QueryFilters {
            lang: options.lang.clone(),
            dir_hint: options.dir_hint.clone(),
            exclude_tests: options.exclude_tests,
        };
        let hnsw_ef = std::cmp::max(64, self.top_k_vector as u32 * 2);

        let vector_future = self.vector.search(
            tenant_id,
            repo_id,
            &qvec,
            self.top_k_vector,
            &filters,
            hnsw_ef,
        );

        let (v_hits, b_hits) = if options.privacy_mode {
            // Plaintext never left the client for this repo; the lexical
            // backend has nothing to search and is never invoked.
            let v_hits = vector_future.await?;
            (v_hits, Vec::new())
        } else {
            let lexical_future =
                self.lexical
                    .bm25_search(tenant_id, repo_id, query, self.top_k_lexical, &filters);
            let (v_result, b_result) = tokio::join!(vector_future, lexical_future);
            let v_hits = v_result?;
            let b_hits = match b_result {
                Ok(hits) => hits,
                Err(err) => {
                    warn!(tenant_id, repo_id, "lexical backend degraded to vector-only: {err}");
                    Vec::new()
                }
            };
            (v_hits, b_hits)
        };

        let mut vdict: HashMap<String, f64> = HashMap::new();
        let mut bdict: HashMap<String, f64> = HashMap::new();
        let mut payloads: HashMap<String, ChunkPayload> = HashMap::new();
        let mut v_order = Vec::new();
        let mut b_order = Vec::new();
        // First-seen union of candidate ids, vector results before lexical.
        // Ranking below does a *stable* sort over this order, so ties break
        // in the order the candidate was first discovered, never by hash
        // iteration or id text.
        let mut order: Vec<String> = Vec::new();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

        for hit in &v_hits {
            vdict.insert(hit.chunk_id.clone(), hit.score);
            payloads
                .entry(hit.chunk_id.clone())
                .or_insert_with(|| hit.payload.clone());
            v_order.push(hit.chunk_id.clone());
            if seen.insert(hit.chunk_id.clone()) {
                order.push(hit.chunk_id.clone());
            }
        }
        for hit in &b_hits {
            bdict.insert(hit.chunk_id.clone(), hit.score);
            // Lexical payloads win when both backends return a chunk: only
            // the lexical index stores plaintext previews.
            payloads.insert(hit.chunk_id.clone(), hit.payload.clone());
            b_order.push(hit.chunk_id.clone());
            if seen.insert(hit.chunk_id.clone()) {
                order.push(hit.chunk_id.clone());
            }
        }

        let vnorm = normalize(&vdict);
        let bnorm = normalize(&bdict);
        let mut ranked = fuse(&vnorm, &bnorm, &order, options.alpha, options.beta);

        if ranked.is_empty() {
            let sets: Vec<Vec<String>> = if b_order.is_empty() {
                vec![v_order.clone()]
            } else {
                vec![v_order.clone(), b_order.clone()]
            };
            let rrf_scores = rrf_fusion(&sets, 1.0, self.rrf_k);
            ranked = order
                .iter()
                .map(|id| (id.clone(), rrf_scores.get(id).copied().unwrap_or(0.0)))
                .collect();
        }

        // Stable sort: equal-score ids keep their position from `order`.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(std::cmp::max(top_k, MIN_RERANK_POOL));

        let mut debug = Vec::with_capacity(ranked.len());
        let mut candidates = Vec::with_capacity(ranked.len());
        for (chunk_id, score) in &ranked {
            let Some(payload) = payloads.get(chunk_id) else {
                continue;
            };
            let span = (payload.line_end - payload.line_start).max(0);
            let depth = payload.path_tokens.len();
            let vn = vnorm.get(chunk_id).copied().unwrap_or(0.0);
            let bn = bnorm.get(chunk_id).copied().unwrap_or(0.0);
            debug.push(DebugRecord {
                chunk_id: chunk_id.clone(),
                fused: *score,
                vnorm: vn,
                bnorm: bn,
                span,
                depth,
            });
            candidates.push((chunk_id.clone(), *score, payload.clone()));
        }

        let passages_present = candidates
            .iter()
            .any(|(_, _, payload)| payload.text.as_deref().is_some_and(|t| !t.is_empty()));

        let hits = if self.ranker.available() && passages_present {
            let features: Vec<[f64; 5]> = debug
                .iter()
                .map(|d| [d.fused, d.vnorm, d.bnorm, d.span as f64, d.depth as f64])
                .collect();
            let lr_scores = self.ranker.score(&features)?;
            let mut order: Vec<usize> = (0..candidates.len()).collect();
            order.sort_by(|&a, &b| {
                lr_scores[b]
                    .partial_cmp(&lr_scores[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            order.truncate(top_k);
            order
                .into_iter()
                .map(|i| to_search_hit(&candidates[i].2, lr_scores[i]))
                .collect()
        } else {
            candidates
                .iter()
                .take(top_k)
                .map(|(_, score, payload)| to_search_hit(payload, *score))
                .collect()
        };

        Ok(SearchOutcome { hits, debug })
    }
}

fn to_search_hit(payload: &ChunkPayload, score: f64) -> SearchHit {
    SearchHit {
        chunk_id: payload.chunk_id.clone(),
        score,
        path_tokens: payload.path_tokens.clone(),
        line_span: [payload.line_start, payload.line_end],
        repo_id: payload.repo_id.clone(),
        preview: payload.text.clone(),
    }
}
