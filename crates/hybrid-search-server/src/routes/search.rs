//! `POST /v1/search`: the hybrid retrieval endpoint, the one path that
//! touches the cache, the rate limiter, and A/B bucketing together.

use crate::context::AppContext;
use crate::error::ApiResult;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hybrid_search_core::bucket::{bucket_for, generate_search_id, weights_for};
use hybrid_search_core::cache::{QueryCacheKey, SearchCacheEntry};
use hybrid_search_core::model::{Bucket, SearchEvent, SearchHit};
use hybrid_search_core::search::SearchOptions;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-api-key").and_then(|v| v.to_str().ok())
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub tenant_id: String,
    pub repo_id: String,
    pub query: String,
    pub top_k: usize,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub dir_hint: Option<String>,
    #[serde(default)]
    pub exclude_tests: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub search_id: String,
    pub bucket: Bucket,
    pub need_fetch_lines: bool,
    pub hits: Vec<SearchHit>,
}

pub async fn search(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    context.api_keys.enforce(&req.tenant_id, api_key(&headers))?;

    let rate_key = format!("{}:{}", req.tenant_id, api_key(&headers).unwrap_or("anonymous"));
    context.rate_limiter.check(&rate_key).await?;

    let need_fetch_lines = context.config.privacy_repo_ids.contains(&req.repo_id);

    let cache_key = QueryCacheKey {
        tenant_id: req.tenant_id.clone(),
        repo_id: req.repo_id.clone(),
        query: req.query.clone(),
        lang: req.lang.clone(),
        dir_hint: req.dir_hint.clone(),
        exclude_tests: req.exclude_tests,
        top_k: req.top_k,
    };

    if let Some(cached) = context.query_cache.get(&cache_key).await? {
        return Ok(Json(SearchResponse {
            search_id: cached.search_id,
            bucket: cached.bucket,
            need_fetch_lines,
            hits: cached.hits,
        }));
    }

    let search_id = generate_search_id();
    let bucket = bucket_for(&search_id);
    let (alpha, beta) = weights_for(
        bucket,
        (context.config.fusion_alpha, context.config.fusion_beta),
        (context.config.variant_alpha, context.config.variant_beta),
    );

    let options = SearchOptions {
        top_k: Some(req.top_k),
        lang: req.lang.clone(),
        dir_hint: req.dir_hint.clone(),
        exclude_tests: req.exclude_tests,
        privacy_mode: need_fetch_lines,
        alpha,
        beta,
    };

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        context.config.request_timeout,
        context
            .engine
            .search_with_debug(&req.tenant_id, &req.repo_id, &req.query, &options),
    )
    .await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let outcome = match outcome {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            context.stats.record_search(elapsed_ms, true);
            warn!(tenant_id = %req.tenant_id, repo_id = %req.repo_id, "search failed: {err}");
            return Err(err.into());
        }
        Err(_elapsed) => {
            // Nothing was mutated before the join completed: no cache entry,
            // no search-log append, no stats write for a half-finished fan-out.
            context.stats.record_search(elapsed_ms, true);
            warn!(tenant_id = %req.tenant_id, repo_id = %req.repo_id, "search cancelled after deadline");
            return Err(hybrid_search_core::error::AppError::Cancelled.into());
        }
    };
    context.stats.record_search(elapsed_ms, false);

    let entry = SearchCacheEntry {
        hits: outcome.hits.clone(),
        debug: outcome.debug.clone(),
        bucket,
        search_id: search_id.clone(),
    };
    context.query_cache.set(&cache_key, &entry).await?;

    let event = SearchEvent {
        search_id: search_id.clone(),
        tenant_id: req.tenant_id.clone(),
        repo_id: req.repo_id.clone(),
        query: req.query.clone(),
        timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        bucket,
        candidates: outcome.debug,
    };
    if let Err(err) = context.search_log.append(&event) {
        warn!("failed to append search log entry: {err}");
    }

    Ok(Json(SearchResponse {
        search_id,
        bucket,
        need_fetch_lines,
        hits: outcome.hits,
    }))
}

/// One client-supplied candidate for the privacy-mode rerank path: the
/// client holds the plaintext, the server never stores it.
#[derive(Debug, Deserialize)]
pub struct FetchLinesItem {
    pub chunk_id: String,
    pub raw_lines: String,
}

#[derive(Debug, Deserialize)]
pub struct FetchLinesRequest {
    pub tenant_id: String,
    pub repo_id: String,
    pub query: String,
    pub items: Vec<FetchLinesItem>,
    pub top_k: usize,
}

#[derive(Debug, Serialize)]
pub struct FetchLinesResponse {
    pub hits: Vec<SearchHit>,
}

pub async fn fetch_lines(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(req): Json<FetchLinesRequest>,
) -> ApiResult<Json<FetchLinesResponse>> {
    context.api_keys.enforce(&req.tenant_id, api_key(&headers))?;

    let candidates: Vec<hybrid_search_core::search::reranker::FetchLinesCandidate> = req
        .items
        .iter()
        .map(|item| hybrid_search_core::search::reranker::FetchLinesCandidate {
            chunk_id: item.chunk_id.clone(),
            text: item.raw_lines.clone(),
        })
        .collect();

    let ranked = context.reranker.rerank(&req.query, &candidates).await?;

    let hits = ranked
        .into_iter()
        .take(req.top_k)
        .map(|r| SearchHit {
            chunk_id: r.chunk_id,
            score: r.score,
            path_tokens: Vec::new(),
            line_span: [0, 0],
            repo_id: req.repo_id.clone(),
            preview: None,
        })
        .collect();

    Ok(Json(FetchLinesResponse { hits }))
}
