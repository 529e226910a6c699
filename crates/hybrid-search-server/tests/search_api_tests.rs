//! End-to-end tests against the axum router with stub backends standing in
//! for the vector/lexical/embedder/reranker/blob/secret services, matching
//! the literal scenarios in the hybrid search spec's testable-properties
//! section.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use hybrid_search_core::auth::ApiKeyValidator;
use hybrid_search_core::cache::{EmbeddingCache, InMemoryBacking, QueryResultCache, SharedBacking};
use hybrid_search_core::config::AppConfig;
use hybrid_search_core::error::{AppError, Result};
use hybrid_search_core::ingest::IngestionHandler;
use hybrid_search_core::jsonl::JsonlAppender;
use hybrid_search_core::limits::RateLimiter;
use hybrid_search_core::model::{Chunk, ChunkPayload, TenantKeyFile};
use hybrid_search_core::providers::{CrossEncoderProvider, Embedder};
use hybrid_search_core::ranker::{FeatureVector, LearnedRanker};
use hybrid_search_core::salt::{SaltProvider, StaticSecretBackend};
use hybrid_search_core::search::{CrossEncoderReranker, HybridSearchEngine};
use hybrid_search_core::stats::StatsTracker;
use hybrid_search_core::store::vector::VectorPoint;
use hybrid_search_core::store::{LexicalHit, LexicalIndex, QueryFilters, VectorHit, VectorIndex};
use hybrid_search_server::context::AppContext;
use hybrid_search_server::routes;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;

/// An in-memory vector store: `upsert` records points per tenant/repo,
/// `search` returns every stored point for the repo scored by cosine
/// distance against an all-zero stub embedding (the stub embedder always
/// returns the same vector, so every candidate ties at score 1.0 and the
/// original insertion order survives as the tiebreak).
#[derive(Default)]
struct StubVectorIndex {
    points: Mutex<HashMap<(String, String), Vec<VectorPoint>>>,
}

#[async_trait]
impl VectorIndex for StubVectorIndex {
    async fn ensure_collection(&self, _tenant_id: &str, _dims: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, tenant_id: &str, points: &[VectorPoint]) -> Result<()> {
        for point in points {
            self.points
                .lock()
                .unwrap()
                .entry((tenant_id.to_string(), point.payload.repo_id.clone()))
                .or_default()
                .push(point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        repo_id: &str,
        _vector: &[f32],
        top_k: usize,
        _filters: &QueryFilters,
        _hnsw_ef: u32,
    ) -> Result<Vec<VectorHit>> {
        let points = self.points.lock().unwrap();
        let hits = points
            .get(&(tenant_id.to_string(), repo_id.to_string()))
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(top_k)
            .map(|p| VectorHit {
                chunk_id: p.chunk_id,
                score: 1.0,
                payload: p.payload,
            })
            .collect();
        Ok(hits)
    }
}

/// Stub lexical store. Privacy-mode chunks are never sent here (ingestion
/// skips it), so any search against a privacy repo trivially returns
/// nothing; that's the behavior scenario 2 below asserts on.
#[derive(Default)]
struct StubLexicalIndex {
    docs: Mutex<HashMap<(String, String), Vec<ChunkPayload>>>,
}

#[async_trait]
impl LexicalIndex for StubLexicalIndex {
    async fn ensure_index(&self, _tenant_id: &str) -> Result<()> {
        Ok(())
    }

    async fn bulk_upsert(&self, tenant_id: &str, docs: &[ChunkPayload]) -> Result<()> {
        for doc in docs {
            self.docs
                .lock()
                .unwrap()
                .entry((tenant_id.to_string(), doc.repo_id.clone()))
                .or_default()
                .push(doc.clone());
        }
        Ok(())
    }

    async fn bm25_search(
        &self,
        tenant_id: &str,
        repo_id: &str,
        _query: &str,
        top_k: usize,
        _filters: &QueryFilters,
    ) -> Result<Vec<LexicalHit>> {
        let docs = self.docs.lock().unwrap();
        let hits = docs
            .get(&(tenant_id.to_string(), repo_id.to_string()))
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(top_k)
            .map(|payload| LexicalHit {
                chunk_id: payload.chunk_id.clone(),
                score: 1.0,
                payload,
            })
            .collect();
        Ok(hits)
    }
}

/// Deterministic embedder: every text maps to the same unit vector, so the
/// stub vector index's cosine-free scoring is irrelevant to the test.
struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0, 0.0])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
    }

    fn model_name(&self) -> &str {
        "stub-embedder"
    }
}

/// Cross-encoder stub used for the fetch-lines rerank path: scores each
/// passage by its length, so ordering is deterministic and checkable.
struct StubCrossEncoder;

#[async_trait]
impl CrossEncoderProvider for StubCrossEncoder {
    async fn score_pairs(&self, _query: &str, passages: &[String]) -> Result<Vec<f64>> {
        Ok(passages.iter().map(|p| p.len() as f64).collect())
    }

    fn model_name(&self) -> &str {
        "stub-cross-encoder"
    }
}

/// No learned ranker configured; the engine falls back to fused scores.
struct NoRanker;

impl LearnedRanker for NoRanker {
    fn available(&self) -> bool {
        false
    }

    fn score(&self, _features: &[FeatureVector]) -> Result<Vec<f64>> {
        Err(AppError::ModelError("no ranker configured".to_string()))
    }
}

fn test_config(tmp_dir: &std::path::Path, rate_limit_per_minute: u32, privacy_repo_ids: HashSet<String>) -> AppConfig {
    AppConfig {
        vector_backend_url: "http://unused".into(),
        vector_collection: "chunks".into(),
        lexical_backend_url: "http://unused".into(),
        lexical_index: "chunks".into(),
        embedder_provider: "sentence-transformers".into(),
        embedder_url: None,
        cross_encoder_provider: "cross-encoder".into(),
        cross_encoder_url: None,
        learned_ranker_path: None,
        top_k_vector: 50,
        top_k_bm25: 50,
        final_k: 10,
        fusion_alpha: 0.6,
        fusion_beta: 0.4,
        rrf_k: 60.0,
        variant_alpha: 0.5,
        variant_beta: 0.5,
        privacy_repo_ids,
        require_api_key: true,
        api_keys_path: None,
        rate_limit_per_minute,
        redis_url: None,
        embedding_cache_capacity: 1_000,
        embedding_cache_ttl: Duration::from_secs(3600),
        query_cache_ttl: Duration::from_secs(30),
        vault_addr: None,
        vault_token: None,
        vault_secret_template: "secret/data/tenants/{tenant}".into(),
        fallback_salts_json: None,
        blob_bucket: None,
        search_log_path: tmp_dir.join("search_log.jsonl").to_str().unwrap().to_string(),
        feedback_log_path: tmp_dir.join("feedback_log.jsonl").to_str().unwrap().to_string(),
        http_timeout: Duration::from_secs(5),
        bind_addr: "127.0.0.1:0".into(),
        request_timeout: Duration::from_secs(5),
    }
}

fn build_context(config: AppConfig) -> Arc<AppContext> {
    let vector: Arc<dyn VectorIndex> = Arc::new(StubVectorIndex::default());
    let lexical: Arc<dyn LexicalIndex> = Arc::new(StubLexicalIndex::default());
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder);
    let cross_encoder: Arc<dyn CrossEncoderProvider> = Arc::new(StubCrossEncoder);
    let ranker: Arc<dyn LearnedRanker> = Arc::new(NoRanker);
    let shared: Arc<dyn SharedBacking> = Arc::new(InMemoryBacking::new());

    let engine = Arc::new(HybridSearchEngine::new(
        vector.clone(),
        lexical.clone(),
        embedder.clone(),
        ranker,
        config.top_k_vector,
        config.top_k_bm25,
        config.final_k,
        config.rrf_k,
    ));
    let reranker = Arc::new(CrossEncoderReranker::new(cross_encoder));

    let embeddings = Arc::new(EmbeddingCache::new(
        embedder,
        config.embedding_cache_capacity,
        shared.clone(),
        config.embedding_cache_ttl,
    ));
    let ingestion = Arc::new(IngestionHandler::new(
        vector,
        lexical,
        embeddings,
        Arc::new(NoopBlobStore),
        config.privacy_repo_ids.clone(),
    ));

    let mut tenant_keys = TenantKeyFile::new();
    tenant_keys.insert("acme".to_string(), vec!["good-key".to_string()]);

    let context = AppContext {
        config: Arc::new(config.clone()),
        engine,
        reranker,
        ingestion,
        query_cache: Arc::new(QueryResultCache::new(shared.clone(), config.query_cache_ttl)),
        rate_limiter: Arc::new(RateLimiter::new(shared, config.rate_limit_per_minute)),
        api_keys: Arc::new(ApiKeyValidator::new(tenant_keys, config.require_api_key)),
        stats: Arc::new(StatsTracker::new()),
        salts: Arc::new(SaltProvider::new(Box::new(StaticSecretBackend::empty()))),
        search_log: Arc::new(JsonlAppender::new(config.search_log_path.clone())),
        feedback_log: Arc::new(JsonlAppender::new(config.feedback_log_path.clone())),
    };

    Arc::new(context)
}

struct NoopBlobStore;

#[async_trait]
impl hybrid_search_core::blob::BlobStore for NoopBlobStore {
    async fn get(&self, _key: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

fn sample_chunk(repo_id: &str, chunk_id: &str, privacy_mode: bool) -> Chunk {
    Chunk {
        chunk_id: chunk_id.to_string(),
        tenant_id: "acme".to_string(),
        repo_id: repo_id.to_string(),
        lang: Some("rust".to_string()),
        path_tokens: vec!["src".to_string(), "lib.rs".to_string()],
        rel_path: if privacy_mode { None } else { Some("src/lib.rs".to_string()) },
        is_test: false,
        line_start: 1,
        line_end: 10,
        privacy_mode,
        text: if privacy_mode { None } else { Some("fn hello() {}".to_string()) },
        vector: if privacy_mode { Some(vec![1.0, 0.0, 0.0, 0.0]) } else { None },
    }
}

async fn json_request(app: axum::Router, method: &str, uri: &str, api_key: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

/// Scenario: upload a single chunk then search for it; exactly one hit
/// comes back.
#[tokio::test]
async fn upload_then_search_returns_one_hit() {
    let tmp = tempdir().unwrap();
    let context = build_context(test_config(tmp.path(), 60, HashSet::new()));
    let app = routes::router(context);

    let upload_body = json!({
        "tenant_id": "acme",
        "chunks": [sample_chunk_json("repo-1", "chunk-1", false)],
    });
    let (status, _) = json_request(app.clone(), "POST", "/v1/index/upload", Some("good-key"), upload_body).await;
    assert_eq!(status, StatusCode::OK);

    let search_body = json!({
        "tenant_id": "acme",
        "repo_id": "repo-1",
        "query": "hello",
        "top_k": 10,
    });
    let (status, parsed) = json_request(app, "POST", "/v1/search", Some("good-key"), search_body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parsed["hits"].as_array().unwrap().len(), 1);
    assert_eq!(parsed["need_fetch_lines"], json!(false));
}

/// Scenario: a privacy-mode repo's search response asks the client to send
/// raw lines back and never carries a text preview.
#[tokio::test]
async fn privacy_mode_upload_then_search_requests_fetch_lines() {
    let tmp = tempdir().unwrap();
    let mut privacy_repos = HashSet::new();
    privacy_repos.insert("secret-repo".to_string());
    let context = build_context(test_config(tmp.path(), 60, privacy_repos));
    let app = routes::router(context);

    let upload_body = json!({
        "tenant_id": "acme",
        "chunks": [sample_chunk_json("secret-repo", "chunk-1", true)],
    });
    let (status, _) = json_request(app.clone(), "POST", "/v1/index/upload", Some("good-key"), upload_body).await;
    assert_eq!(status, StatusCode::OK);

    let search_body = json!({
        "tenant_id": "acme",
        "repo_id": "secret-repo",
        "query": "hello",
        "top_k": 10,
    });
    let (status, parsed) = json_request(app, "POST", "/v1/search", Some("good-key"), search_body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parsed["need_fetch_lines"], json!(true));
    for hit in parsed["hits"].as_array().unwrap() {
        assert_eq!(hit["preview"], Value::Null);
    }
}

/// Scenario: with `rate_per_minute = 2`, a third call in the same window
/// is rejected with 429 while the first two succeed.
#[tokio::test]
async fn third_search_in_window_is_rate_limited() {
    let tmp = tempdir().unwrap();
    let context = build_context(test_config(tmp.path(), 2, HashSet::new()));
    let app = routes::router(context);

    let search_body = json!({
        "tenant_id": "acme",
        "repo_id": "repo-1",
        "query": "hello world",
        "top_k": 10,
    });

    let (s1, _) = json_request(app.clone(), "POST", "/v1/search", Some("good-key"), search_body.clone()).await;
    let (s2, _) = json_request(app.clone(), "POST", "/v1/search", Some("good-key"), search_body.clone()).await;
    let (s3, _) = json_request(app, "POST", "/v1/search", Some("good-key"), search_body).await;

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(s3, StatusCode::TOO_MANY_REQUESTS);
}

/// Scenario: two identical `/search` calls within the cache TTL produce the
/// same `search_id`/`bucket`, and the second is a pure cache replay.
#[tokio::test]
async fn repeated_identical_search_reuses_search_id_and_bucket() {
    let tmp = tempdir().unwrap();
    let context = build_context(test_config(tmp.path(), 60, HashSet::new()));
    let app = routes::router(context);

    let search_body = json!({
        "tenant_id": "acme",
        "repo_id": "repo-1",
        "query": "cache me",
        "top_k": 10,
    });

    let (s1, first) = json_request(app.clone(), "POST", "/v1/search", Some("good-key"), search_body.clone()).await;
    let (s2, second) = json_request(app, "POST", "/v1/search", Some("good-key"), search_body).await;

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(first["search_id"], second["search_id"]);
    assert_eq!(first["bucket"], second["bucket"]);
}

/// Missing API key is rejected before the request reaches the engine.
#[tokio::test]
async fn search_without_api_key_is_unauthorized() {
    let tmp = tempdir().unwrap();
    let context = build_context(test_config(tmp.path(), 60, HashSet::new()));
    let app = routes::router(context);

    let search_body = json!({
        "tenant_id": "acme",
        "repo_id": "repo-1",
        "query": "hello",
        "top_k": 10,
    });
    let (status, _) = json_request(app, "POST", "/v1/search", None, search_body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Invalid API key is distinguished from a missing one.
#[tokio::test]
async fn search_with_wrong_api_key_is_forbidden() {
    let tmp = tempdir().unwrap();
    let context = build_context(test_config(tmp.path(), 60, HashSet::new()));
    let app = routes::router(context);

    let search_body = json!({
        "tenant_id": "acme",
        "repo_id": "repo-1",
        "query": "hello",
        "top_k": 10,
    });
    let (status, _) = json_request(app, "POST", "/v1/search", Some("wrong-key"), search_body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

/// `/v1/metrics` reflects searches recorded through the router.
#[tokio::test]
async fn metrics_reflects_recorded_searches() {
    let tmp = tempdir().unwrap();
    let context = build_context(test_config(tmp.path(), 60, HashSet::new()));
    let app = routes::router(context);

    let search_body = json!({
        "tenant_id": "acme",
        "repo_id": "repo-1",
        "query": "hello",
        "top_k": 10,
    });
    let (status, _) = json_request(app.clone(), "POST", "/v1/search", Some("good-key"), search_body).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder().method("GET").uri("/v1/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let snapshot: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(snapshot["search_total"], json!(1));
}

/// `/v1/feedback` records a feedback event and bumps the feedback counter.
#[tokio::test]
async fn feedback_is_recorded() {
    let tmp = tempdir().unwrap();
    let context = build_context(test_config(tmp.path(), 60, HashSet::new()));
    let app = routes::router(context);

    let feedback_body = json!({
        "search_id": "abc123",
        "clicked_chunk_id": "chunk-1",
        "grade": 1,
    });
    let (status, parsed) = json_request(app, "POST", "/v1/feedback", None, feedback_body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parsed["status"], json!("ok"));
}

/// `/v1/tenant/salt` returns the well-known empty salt when none is on
/// record for the tenant.
#[tokio::test]
async fn tenant_salt_defaults_to_empty_when_unconfigured() {
    let tmp = tempdir().unwrap();
    let context = build_context(test_config(tmp.path(), 60, HashSet::new()));
    let app = routes::router(context);

    let request = Request::builder()
        .method("GET")
        .uri("/v1/tenant/salt?tenant_id=acme")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["salt_ver"], json!(0));
    assert_eq!(parsed["salt"], json!(""));
}

fn sample_chunk_json(repo_id: &str, chunk_id: &str, privacy_mode: bool) -> Value {
    serde_json::to_value(sample_chunk(repo_id, chunk_id, privacy_mode)).unwrap()
}
