//! Environment-driven application configuration.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

/// Top-level configuration, assembled once at startup from the process
/// environment. Every field here maps to one of the service's documented
/// environment variables, except for a handful of ambient additions
/// (timeouts, bind address, log paths) with sane local-dev defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub vector_backend_url: String,
    pub vector_collection: String,
    pub lexical_backend_url: String,
    pub lexical_index: String,

    pub embedder_provider: String,
    pub embedder_url: Option<String>,
    pub cross_encoder_provider: String,
    pub cross_encoder_url: Option<String>,
    pub learned_ranker_path: Option<String>,

    pub top_k_vector: usize,
    pub top_k_bm25: usize,
    pub final_k: usize,

    pub fusion_alpha: f64,
    pub fusion_beta: f64,
    pub rrf_k: f64,
    pub variant_alpha: f64,
    pub variant_beta: f64,

    pub privacy_repo_ids: HashSet<String>,

    pub require_api_key: bool,
    pub api_keys_path: Option<String>,

    pub rate_limit_per_minute: u32,
    pub redis_url: Option<String>,

    pub embedding_cache_capacity: usize,
    pub embedding_cache_ttl: Duration,
    pub query_cache_ttl: Duration,

    pub vault_addr: Option<String>,
    pub vault_token: Option<String>,
    pub vault_secret_template: String,
    pub fallback_salts_json: Option<String>,

    pub blob_bucket: Option<String>,

    pub search_log_path: String,
    pub feedback_log_path: String,

    pub http_timeout: Duration,
    pub bind_addr: String,

    /// Caller deadline a route handler allows the retrieval fan-out before
    /// cancelling and returning [`crate::error::AppError::Cancelled`].
    pub request_timeout: Duration,
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_csv_set(key: &str) -> HashSet<String> {
    env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl AppConfig {
    /// Build configuration from environment variables, falling back to the
    /// defaults a local developer setup needs.
    pub fn from_env() -> Self {
        Self {
            vector_backend_url: env_string("QDRANT_URL", "http://localhost:6333"),
            vector_collection: env_string("QDRANT_COLLECTION", "chunks"),
            lexical_backend_url: env_string("OPENSEARCH_URL", "http://localhost:9200"),
            lexical_index: env_string("OPENSEARCH_INDEX", "chunks"),

            embedder_provider: env_string("EMBED_MODEL", "sentence-transformers"),
            embedder_url: env_opt("EMBEDDER_URL"),
            cross_encoder_provider: env_string("RERANKER_MODEL", "cross-encoder"),
            cross_encoder_url: env_opt("CROSS_ENCODER_URL"),
            learned_ranker_path: env_opt("LEARNED_RANKER_PATH"),

            top_k_vector: env_parse("TOP_K_VECTOR", 100),
            top_k_bm25: env_parse("TOP_K_BM25", 100),
            final_k: env_parse("FINAL_K", 10),

            fusion_alpha: env_parse("ALPHA_VEC", 0.6),
            fusion_beta: env_parse("BETA_BM25", 0.4),
            rrf_k: env_parse("RRF_K", 60.0),
            variant_alpha: env_parse("AB_VARIANT_ALPHA", 0.5),
            variant_beta: env_parse("AB_VARIANT_BETA", 0.5),

            privacy_repo_ids: env_csv_set("PRIVACY_REPOS"),

            require_api_key: env_bool("REQUIRE_API_KEY", false),
            api_keys_path: env_opt("API_KEYS_PATH"),

            rate_limit_per_minute: env_parse("LIMIT_SEARCH_PER_MINUTE", 60),
            redis_url: env_opt("REDIS_URL"),

            embedding_cache_capacity: env_parse("EMBED_CACHE_SIZE", 10_000),
            embedding_cache_ttl: Duration::from_secs(env_parse("EMBED_CACHE_TTL_SECS", 3600)),
            query_cache_ttl: Duration::from_secs(env_parse("SEARCH_CACHE_TTL_S", 30)),

            vault_addr: env_opt("VAULT_ADDR"),
            vault_token: env_opt("VAULT_TOKEN"),
            vault_secret_template: env_string("VAULT_SECRET_TEMPLATE", "secret/data/tenants/{tenant}"),
            fallback_salts_json: env_opt("FALLBACK_SALTS_JSON"),

            blob_bucket: env_opt("S3_BUCKET"),

            search_log_path: env_string("SEARCH_LOG_PATH", "search_log.jsonl"),
            feedback_log_path: env_string("FEEDBACK_LOG_PATH", "feedback_log.jsonl"),

            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 10)),
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:8080"),

            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", 20)),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
