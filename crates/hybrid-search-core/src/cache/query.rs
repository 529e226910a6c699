//! Query result cache: short-TTL reuse of a full search response, keyed on
//! the exact request shape so a cache hit replays the same bucket and
//! search id the client already saw.

use super::shared::SharedBacking;
use crate::error::{AppError, Result};
use crate::model::{Bucket, DebugRecord, SearchHit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// The exact request shape a cache hit must match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryCacheKey {
    pub tenant_id: String,
    pub repo_id: String,
    pub query: String,
    pub lang: Option<String>,
    pub dir_hint: Option<String>,
    pub exclude_tests: bool,
    pub top_k: usize,
}

impl QueryCacheKey {
    fn as_redis_key(&self) -> String {
        format!(
            "search-cache:{}:{}:{}:{}:{}:{}:{}",
            self.tenant_id,
            self.repo_id,
            self.query,
            self.lang.as_deref().unwrap_or(""),
            self.dir_hint.as_deref().unwrap_or(""),
            self.exclude_tests,
            self.top_k,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCacheEntry {
    pub hits: Vec<SearchHit>,
    pub debug: Vec<DebugRecord>,
    pub bucket: Bucket,
    pub search_id: String,
}

pub struct QueryResultCache {
    shared: Arc<dyn SharedBacking>,
    ttl: Duration,
}

impl QueryResultCache {
    pub fn new(shared: Arc<dyn SharedBacking>, ttl: Duration) -> Self {
        Self { shared, ttl }
    }

    pub async fn get(&self, key: &QueryCacheKey) -> Result<Option<SearchCacheEntry>> {
        let raw = self
            .shared
            .get(&key.as_redis_key())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(raw.and_then(|bytes| serde_json::from_slice(&bytes).ok()))
    }

    pub async fn set(&self, key: &QueryCacheKey, entry: &SearchCacheEntry) -> Result<()> {
        let bytes = serde_json::to_vec(entry)?;
        self.shared
            .set(&key.as_redis_key(), bytes, Some(self.ttl))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::shared::InMemoryBacking;

    fn key() -> QueryCacheKey {
        QueryCacheKey {
            tenant_id: "acme".to_string(),
            repo_id: "repo1".to_string(),
            query: "fn main".to_string(),
            lang: None,
            dir_hint: None,
            exclude_tests: false,
            top_k: 5,
        }
    }

    fn entry() -> SearchCacheEntry {
        SearchCacheEntry {
            hits: Vec::new(),
            debug: Vec::new(),
            bucket: Bucket::Control,
            search_id: "abc123".to_string(),
        }
    }

    #[tokio::test]
    async fn hit_replays_the_same_bucket_and_search_id() {
        let cache = QueryResultCache::new(Arc::new(InMemoryBacking::new()), Duration::from_secs(30));
        cache.set(&key(), &entry()).await.unwrap();

        let cached = cache.get(&key()).await.unwrap().unwrap();
        assert_eq!(cached.search_id, "abc123");
        assert_eq!(cached.bucket, Bucket::Control);
    }

    #[tokio::test]
    async fn miss_on_different_top_k() {
        let cache = QueryResultCache::new(Arc::new(InMemoryBacking::new()), Duration::from_secs(30));
        cache.set(&key(), &entry()).await.unwrap();

        let mut other = key();
        other.top_k = 10;
        assert!(cache.get(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn shared_backend_serves_a_second_cache_instance() {
        let shared: Arc<dyn SharedBacking> = Arc::new(InMemoryBacking::new());
        let cache_a = QueryResultCache::new(shared.clone(), Duration::from_secs(30));
        cache_a.set(&key(), &entry()).await.unwrap();

        let cache_b = QueryResultCache::new(shared, Duration::from_secs(30));
        let cached = cache_b.get(&key()).await.unwrap().unwrap();
        assert_eq!(cached.search_id, "abc123");
    }
}
