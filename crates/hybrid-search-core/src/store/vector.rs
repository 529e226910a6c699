//! Vector backend adapter: HNSW-style ANN search over a Qdrant-shaped
//! HTTP service, one collection per tenant.

use super::QueryFilters;
use crate::error::{AppError, Result};
use crate::model::ChunkPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HNSW construction parameters applied when a tenant collection is first
/// created; matches the defaults the retrieval quality was tuned against.
pub const HNSW_M: u32 = 32;
pub const HNSW_EF_CONSTRUCT: u32 = 128;

/// One ranked vector hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub chunk_id: String,
    pub score: f64,
    pub payload: ChunkPayload,
}

/// A point to upsert into a tenant's collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the tenant's collection if it doesn't exist yet.
    async fn ensure_collection(&self, tenant_id: &str, dims: usize) -> Result<()>;

    async fn upsert(&self, tenant_id: &str, points: &[VectorPoint]) -> Result<()>;

    /// Search within `repo_id`, optionally narrowed by `filters`.
    ///
    /// `hnsw_ef` follows the engine's `max(64, top_k * 2)` convention; the
    /// caller computes it, this adapter just forwards it as a search
    /// parameter.
    async fn search(
        &self,
        tenant_id: &str,
        repo_id: &str,
        vector: &[f32],
        top_k: usize,
        filters: &QueryFilters,
        hnsw_ef: u32,
    ) -> Result<Vec<VectorHit>>;
}

fn collection_for(collection_base: &str, tenant_id: &str) -> String {
    format!("{collection_base}_{tenant_id}")
}

/// HTTP client for a Qdrant-shaped vector service.
pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    collection_base: String,
}

impl HttpVectorIndex {
    pub fn new(base_url: String, collection_base: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            collection_base,
        })
    }
}

#[derive(Serialize)]
struct VectorParamsBody {
    size: usize,
    distance: &'static str,
    hnsw_config: HnswConfigBody,
}

#[derive(Serialize)]
struct HnswConfigBody {
    m: u32,
    ef_construct: u32,
}

#[derive(Serialize)]
struct SearchFilterBody {
    #[serde(rename = "must")]
    must: Vec<serde_json::Value>,
    #[serde(rename = "must_not", skip_serializing_if = "Vec::is_empty")]
    must_not: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct SearchBody<'a> {
    query_vector: &'a [f32],
    limit: usize,
    query_filter: SearchFilterBody,
    hnsw_ef: u32,
}

#[derive(Deserialize)]
struct SearchResponseBody {
    hits: Vec<VectorHit>,
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn ensure_collection(&self, tenant_id: &str, dims: usize) -> Result<()> {
        let coll = collection_for(&self.collection_base, tenant_id);
        let body = VectorParamsBody {
            size: dims,
            distance: "cosine",
            hnsw_config: HnswConfigBody {
                m: HNSW_M,
                ef_construct: HNSW_EF_CONSTRUCT,
            },
        };
        let resp = self
            .client
            .put(format!("{}/collections/{}", self.base_url, coll))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::BackendVectorUnavailable(e.to_string()))?;
        if !resp.status().is_success() && resp.status().as_u16() != 409 {
            return Err(AppError::BackendVectorUnavailable(format!(
                "ensure_collection failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn upsert(&self, tenant_id: &str, points: &[VectorPoint]) -> Result<()> {
        let coll = collection_for(&self.collection_base, tenant_id);
        let resp = self
            .client
            .put(format!("{}/collections/{}/points", self.base_url, coll))
            .json(&serde_json::json!({ "points": points }))
            .send()
            .await
            .map_err(|e| AppError::BackendVectorUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AppError::BackendVectorUnavailable(format!(
                "upsert failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        repo_id: &str,
        vector: &[f32],
        top_k: usize,
        filters: &QueryFilters,
        hnsw_ef: u32,
    ) -> Result<Vec<VectorHit>> {
        let coll = collection_for(&self.collection_base, tenant_id);
        let mut must = vec![serde_json::json!({"key":"repo_id","match":{"value":repo_id}})];
        if let Some(lang) = &filters.lang {
            must.push(serde_json::json!({"key":"lang","match":{"value":lang}}));
        }
        if let Some(dir_hint) = &filters.dir_hint {
            must.push(serde_json::json!({"key":"rel_path","match":{"text":dir_hint}}));
        }
        let mut must_not = Vec::new();
        if filters.exclude_tests {
            must_not.push(serde_json::json!({"key":"rel_path","match":{"text":"test"}}));
        }

        let body = SearchBody {
            query_vector: vector,
            limit: top_k,
            query_filter: SearchFilterBody { must, must_not },
            hnsw_ef,
        };

        let resp = self
            .client
            .post(format!("{}/collections/{}/points/search", self.base_url, coll))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::BackendVectorUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AppError::BackendVectorUnavailable(format!(
                "search failed with status {}",
                resp.status()
            )));
        }
        let parsed: SearchResponseBody = resp
            .json()
            .await
            .map_err(|e| AppError::BackendVectorUnavailable(e.to_string()))?;
        Ok(parsed.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_naming_is_tenant_scoped_under_the_configured_base() {
        assert_eq!(collection_for("chunks", "acme"), "chunks_acme");
        assert_ne!(collection_for("chunks", "acme"), collection_for("chunks", "globex"));
        assert_ne!(collection_for("chunks", "acme"), collection_for("other_base", "acme"));
    }
}
