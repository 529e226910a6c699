//! Embedding and cross-encoder provider abstractions, plus HTTP adapters and
//! the registries that resolve a configured provider key to an instance.

pub mod registry;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use registry::ProviderRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Generates dense embeddings for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn model_name(&self) -> &str;
}

/// Scores a `(query, passage)` pair directly, for the privacy-mode
/// fetch-lines rerank path. Unlike a chat-completion-based reranker, this
/// never round-trips through a prompt template.
#[async_trait]
pub trait CrossEncoderProvider: Send + Sync {
    async fn score_pairs(&self, query: &str, passages: &[String]) -> Result<Vec<f64>>;
    fn model_name(&self) -> &str;
}

/// HTTP-backed embedder calling an external embedding service.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
}

impl HttpEmbedder {
    pub fn new(base_url: String, model_name: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            model_name,
        })
    }
}

#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ModelError("embedder returned no vectors".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&EmbedRequest { texts })
            .send()
            .await
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AppError::ModelError(format!(
                "embedder returned status {}",
                resp.status()
            )));
        }
        let parsed: EmbedResponse = resp.json().await.map_err(|e| AppError::ModelError(e.to_string()))?;
        Ok(parsed.vectors)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// HTTP-backed cross-encoder calling an external reranking service.
pub struct HttpCrossEncoder {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
}

impl HttpCrossEncoder {
    pub fn new(base_url: String, model_name: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            model_name,
        })
    }
}

#[derive(serde::Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    passages: &'a [String],
}

#[derive(serde::Deserialize)]
struct RerankResponse {
    scores: Vec<f64>,
}

#[async_trait]
impl CrossEncoderProvider for HttpCrossEncoder {
    async fn score_pairs(&self, query: &str, passages: &[String]) -> Result<Vec<f64>> {
        let resp = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&RerankRequest { query, passages })
            .send()
            .await
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AppError::ModelError(format!(
                "cross-encoder returned status {}",
                resp.status()
            )));
        }
        let parsed: RerankResponse = resp.json().await.map_err(|e| AppError::ModelError(e.to_string()))?;
        Ok(parsed.scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Build the embedding provider registry: `sentence-transformers` (and its
/// `hf`/`huggingface` aliases) is the default, resolved against whatever
/// `base_url`/`model_name`/`timeout` the caller already has in hand.
pub fn embedding_registry(
    base_url: String,
    model_name: String,
    timeout: Duration,
) -> ProviderRegistry<Result<Arc<dyn Embedder>>> {
    let mut registry = ProviderRegistry::new("sentence-transformers");
    let url = base_url.clone();
    let name = model_name.clone();
    registry.register(
        "sentence-transformers",
        &["hf", "huggingface"],
        move || -> Result<Arc<dyn Embedder>> {
            Ok(Arc::new(HttpEmbedder::new(url.clone(), name.clone(), timeout)?))
        },
    );
    registry
}

/// Build the cross-encoder provider registry, `cross-encoder` as default.
pub fn cross_encoder_registry(
    base_url: String,
    model_name: String,
    timeout: Duration,
) -> ProviderRegistry<Result<Arc<dyn CrossEncoderProvider>>> {
    let mut registry = ProviderRegistry::new("cross-encoder");
    let url = base_url.clone();
    let name = model_name.clone();
    registry.register(
        "cross-encoder",
        &["cross_encoder", "reranker"],
        move || -> Result<Arc<dyn CrossEncoderProvider>> {
            Ok(Arc::new(HttpCrossEncoder::new(url.clone(), name.clone(), timeout)?))
        },
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_registry_resolves_default_and_aliases() {
        let registry = embedding_registry(
            "http://localhost:9000".to_string(),
            "bge-small".to_string(),
            Duration::from_secs(5),
        );
        let resolved = registry.create(Some("huggingface")).unwrap();
        let embedder = resolved.instance.unwrap();
        assert_eq!(embedder.model_name(), "bge-small");
        assert_eq!(resolved.resolved_key, "sentence-transformers");
    }

    #[test]
    fn embedding_registry_falls_back_on_unknown_key() {
        let registry = embedding_registry(
            "http://localhost:9000".to_string(),
            "bge-small".to_string(),
            Duration::from_secs(5),
        );
        let resolved = registry.create(Some("made-up-provider")).unwrap();
        assert_eq!(resolved.fallback_from.as_deref(), Some("made-up-provider"));
        assert!(resolved.instance.is_ok());
    }
}
