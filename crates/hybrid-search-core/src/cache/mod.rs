//! Caching layer: embedding reuse and short-TTL query result caching, both
//! backed by the same shared/in-memory abstraction.

pub mod embedding;
pub mod query;
pub mod shared;

pub use embedding::EmbeddingCache;
pub use query::{QueryCacheKey, QueryResultCache, SearchCacheEntry};
pub use shared::{InMemoryBacking, RedisBacking, SharedBacking, SoftFailBacking};
