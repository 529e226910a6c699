//! Process wiring: turns an [`AppConfig`] into every long-lived service the
//! routes need, shared behind `Arc` as axum `State`.

use hybrid_search_core::auth::ApiKeyValidator;
use hybrid_search_core::blob::{BlobStore, ObjectStoreBlob};
use hybrid_search_core::cache::{
    EmbeddingCache, InMemoryBacking, QueryResultCache, RedisBacking, SharedBacking, SoftFailBacking,
};
use hybrid_search_core::config::AppConfig;
use hybrid_search_core::ingest::IngestionHandler;
use hybrid_search_core::jsonl::JsonlAppender;
use hybrid_search_core::limits::RateLimiter;
use hybrid_search_core::model::TenantKeyFile;
use hybrid_search_core::providers::{cross_encoder_registry, embedding_registry};
use hybrid_search_core::ranker::{FileLearnedRanker, LearnedRanker};
use hybrid_search_core::salt::{SaltProvider, SecretBackend, StaticSecretBackend, VaultSecretBackend};
use hybrid_search_core::search::{CrossEncoderReranker, HybridSearchEngine};
use hybrid_search_core::stats::StatsTracker;
use hybrid_search_core::store::{HttpLexicalIndex, HttpVectorIndex};
use hybrid_search_core::Result;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Everything an `/v1` route handler needs, cloned cheaply behind `Arc`s.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub engine: Arc<HybridSearchEngine>,
    pub reranker: Arc<CrossEncoderReranker>,
    pub ingestion: Arc<IngestionHandler>,
    pub query_cache: Arc<QueryResultCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub api_keys: Arc<ApiKeyValidator>,
    pub stats: Arc<StatsTracker>,
    pub salts: Arc<SaltProvider>,
    pub search_log: Arc<JsonlAppender>,
    pub feedback_log: Arc<JsonlAppender>,
}

fn shared_backing(config: &AppConfig) -> Arc<dyn SharedBacking> {
    match &config.redis_url {
        Some(url) => {
            let url = url.clone();
            // `connect` is async; block the (single, startup-time) call so
            // `AppContext::build` stays a plain function callable from
            // `#[tokio::main]` before the router exists.
            let handle = tokio::runtime::Handle::current();
            let result = tokio::task::block_in_place(|| handle.block_on(RedisBacking::connect(&url)));
            match result {
                Ok(backing) => Arc::new(SoftFailBacking::new(Some(Box::new(backing)))),
                Err(err) => {
                    warn!("redis connection failed at startup, falling back to in-memory backing: {err}");
                    Arc::new(SoftFailBacking::local_only())
                }
            }
        }
        None => Arc::new(SoftFailBacking::local_only()),
    }
}

fn load_tenant_keys(path: Option<&str>) -> TenantKeyFile {
    let Some(path) = path else {
        return TenantKeyFile::new();
    };
    if !Path::new(path).exists() {
        return TenantKeyFile::new();
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!("failed to parse tenant key file {path}: {err}");
            TenantKeyFile::new()
        }),
        Err(err) => {
            warn!("failed to read tenant key file {path}: {err}");
            TenantKeyFile::new()
        }
    }
}

fn build_secret_backend(config: &AppConfig) -> Result<Box<dyn SecretBackend>> {
    if let (Some(addr), Some(token)) = (&config.vault_addr, &config.vault_token) {
        return Ok(Box::new(VaultSecretBackend::new(
            addr.clone(),
            token.clone(),
            config.vault_secret_template.clone(),
            config.http_timeout,
        )?));
    }
    match &config.fallback_salts_json {
        Some(raw) => Ok(Box::new(StaticSecretBackend::from_json(raw)?)),
        None => Ok(Box::new(StaticSecretBackend::empty())),
    }
}

fn build_blob_store(config: &AppConfig) -> Arc<dyn BlobStore> {
    let Some(bucket) = &config.blob_bucket else {
        return Arc::new(ObjectStoreBlob::new(Arc::new(InMemory::new())));
    };
    let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);
    if let Ok(endpoint) = std::env::var("S3_ENDPOINT") {
        builder = builder.with_endpoint(endpoint).with_allow_http(true);
    }
    if let Ok(region) = std::env::var("S3_REGION") {
        builder = builder.with_region(region);
    }
    if let Ok(key) = std::env::var("S3_ACCESS_KEY_ID") {
        builder = builder.with_access_key_id(key);
    }
    if let Ok(secret) = std::env::var("S3_SECRET_ACCESS_KEY") {
        builder = builder.with_secret_access_key(secret);
    }
    match builder.build() {
        Ok(store) => {
            let store: Arc<dyn ObjectStore> = Arc::new(store);
            Arc::new(ObjectStoreBlob::new(store))
        }
        Err(err) => {
            warn!("failed to build S3 blob backend, falling back to in-memory: {err}");
            Arc::new(ObjectStoreBlob::new(Arc::new(InMemory::new())))
        }
    }
}

impl AppContext {
    /// Build every service from `config`. Fallible only where a
    /// misconfigured learned-ranker artifact or tenant-key file would make
    /// the process boot into a broken state silently.
    pub fn build(config: AppConfig) -> Result<Self> {
        let vector = Arc::new(HttpVectorIndex::new(
            config.vector_backend_url.clone(),
            config.vector_collection.clone(),
            config.http_timeout,
        )?);
        let lexical = Arc::new(HttpLexicalIndex::new(
            config.lexical_backend_url.clone(),
            config.lexical_index.clone(),
            config.http_timeout,
        )?);

        let embedder = embedding_registry(
            config.embedder_url.clone().unwrap_or_else(|| config.vector_backend_url.clone()),
            config.embedder_provider.clone(),
            config.http_timeout,
        )
        .create(Some(&config.embedder_provider))
        .map_err(hybrid_search_core::AppError::Internal)?
        .instance?;

        let cross_encoder = cross_encoder_registry(
            config.cross_encoder_url.clone().unwrap_or_default(),
            config.cross_encoder_provider.clone(),
            config.http_timeout,
        )
        .create(Some(&config.cross_encoder_provider))
        .map_err(hybrid_search_core::AppError::Internal)?
        .instance?;

        let ranker: Arc<dyn LearnedRanker> = Arc::new(FileLearnedRanker::load(config.learned_ranker_path.as_deref())?);

        let backing = shared_backing(&config);

        let embedding_cache = Arc::new(EmbeddingCache::new(
            embedder.clone(),
            config.embedding_cache_capacity,
            backing.clone(),
            config.embedding_cache_ttl,
        ));

        let query_cache = Arc::new(QueryResultCache::new(backing.clone(), config.query_cache_ttl));
        let rate_limiter = Arc::new(RateLimiter::new(backing.clone(), config.rate_limit_per_minute));

        let tenant_keys = load_tenant_keys(config.api_keys_path.as_deref());
        let api_keys = Arc::new(ApiKeyValidator::new(tenant_keys, config.require_api_key));

        let salts = Arc::new(SaltProvider::new(build_secret_backend(&config)?));
        let blob = build_blob_store(&config);

        let ingestion = Arc::new(IngestionHandler::new(
            vector.clone(),
            lexical.clone(),
            embedding_cache.clone(),
            blob,
            config.privacy_repo_ids.clone(),
        ));

        let engine = Arc::new(HybridSearchEngine::new(
            vector,
            lexical,
            embedder,
            ranker,
            config.top_k_vector,
            config.top_k_bm25,
            config.final_k,
            config.rrf_k,
        ));

        let reranker = Arc::new(CrossEncoderReranker::new(cross_encoder));

        Ok(Self {
            stats: Arc::new(StatsTracker::new()),
            search_log: Arc::new(JsonlAppender::new(config.search_log_path.clone())),
            feedback_log: Arc::new(JsonlAppender::new(config.feedback_log_path.clone())),
            config: Arc::new(config),
            engine,
            reranker,
            ingestion,
            query_cache,
            rate_limiter,
            api_keys,
            salts,
        })
    }
}
