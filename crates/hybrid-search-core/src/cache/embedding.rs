//! Embedding cache: local LRU reuse plus an optional shared backend so
//! repeated queries across instances skip the embedder entirely.

use super::shared::SharedBacking;
use crate::error::{AppError, Result};
use crate::providers::Embedder;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn embedding_cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("embed:{:x}", hasher.finalize())
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    serde_json::to_vec(vector).expect("f32 vectors always serialize")
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    serde_json::from_slice(bytes).ok()
}

/// Wraps an [`Embedder`] with an LRU cache (process-local hits) in front of
/// an optional shared backend (cross-instance hits), keyed on
/// `sha256(text)` so the key itself never leaks the source text.
pub struct EmbeddingCache {
    provider: Arc<dyn Embedder>,
    local: Mutex<LruCache<String, Vec<f32>>>,
    shared: Arc<dyn SharedBacking>,
    ttl: Duration,
}

impl EmbeddingCache {
    pub fn new(provider: Arc<dyn Embedder>, capacity: usize, shared: Arc<dyn SharedBacking>, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            provider,
            local: Mutex::new(LruCache::new(capacity)),
            shared,
            ttl,
        }
    }

    /// Return the embedding for `text`, computing it only on a full miss.
    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.local.lock().unwrap().get(text).cloned() {
            return Ok(vector);
        }

        let key = embedding_cache_key(text);
        if let Ok(Some(bytes)) = self.shared.get(&key).await {
            if let Some(vector) = decode_vector(&bytes) {
                self.local.lock().unwrap().put(text.to_string(), vector.clone());
                return Ok(vector);
            }
        }

        let vector = self.provider.embed(text).await?;
        self.local
            .lock()
            .unwrap()
            .put(text.to_string(), vector.clone());
        self.shared
            .set(&key, encode_vector(&vector), Some(self.ttl))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::shared::InMemoryBacking;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn repeated_text_hits_local_cache_and_calls_provider_once() {
        let provider = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(
            provider.clone(),
            10,
            Arc::new(InMemoryBacking::new()),
            Duration::from_secs(60),
        );

        let first = cache.encode("hello").await.unwrap();
        let second = cache.encode("hello").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shared_backend_is_reused_across_separate_cache_instances() {
        let shared: Arc<dyn SharedBacking> = Arc::new(InMemoryBacking::new());

        let provider_a = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cache_a = EmbeddingCache::new(provider_a.clone(), 1, shared.clone(), Duration::from_secs(30));
        let first = cache_a.encode("shared-text").await.unwrap();
        assert_eq!(provider_a.calls.load(Ordering::SeqCst), 1);

        let provider_b = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cache_b = EmbeddingCache::new(provider_b.clone(), 1, shared, Duration::from_secs(30));
        let second = cache_b.encode("shared-text").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider_b.calls.load(Ordering::SeqCst), 0);
    }
}
