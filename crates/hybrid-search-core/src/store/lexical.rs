//! Lexical backend adapter: BM25 search over an OpenSearch-shaped HTTP
//! service, one index per tenant, with code-aware analyzers.

use super::QueryFilters;
use crate::error::{AppError, Result};
use crate::model::ChunkPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// edge-ngram bounds for the code-text analyzer (`edge_2_20`).
pub const EDGE_NGRAM_MIN: u32 = 2;
pub const EDGE_NGRAM_MAX: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub score: f64,
    pub payload: ChunkPayload,
}

#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn ensure_index(&self, tenant_id: &str) -> Result<()>;

    async fn bulk_upsert(&self, tenant_id: &str, docs: &[ChunkPayload]) -> Result<()>;

    async fn bm25_search(
        &self,
        tenant_id: &str,
        repo_id: &str,
        query: &str,
        top_k: usize,
        filters: &QueryFilters,
    ) -> Result<Vec<LexicalHit>>;
}

fn index_for(index_base: &str, tenant_id: &str) -> String {
    format!("{index_base}_{tenant_id}")
}

fn analyzer_mapping() -> serde_json::Value {
    serde_json::json!({
        "settings": {
            "index": { "number_of_shards": 1, "number_of_replicas": 0 },
            "analysis": {
                "analyzer": {
                    "code_text": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "word_delimiter_graph", "asciifolding", "edge_ngram_filter"]
                    },
                    "path_analyzer": {
                        "type": "custom",
                        "tokenizer": "path_hierarchy",
                        "filter": ["lowercase"]
                    }
                },
                "filter": {
                    "edge_ngram_filter": {
                        "type": "edge_ngram",
                        "min_gram": EDGE_NGRAM_MIN,
                        "max_gram": EDGE_NGRAM_MAX
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "repo_id": { "type": "keyword" },
                "chunk_id": { "type": "keyword" },
                "path_tokens": { "type": "keyword" },
                "rel_path": {
                    "type": "text",
                    "analyzer": "path_analyzer",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "lang": { "type": "keyword" },
                "line_start": { "type": "integer" },
                "line_end": { "type": "integer" },
                "text": { "type": "text", "analyzer": "code_text", "search_analyzer": "standard" }
            }
        }
    })
}

/// HTTP client for an OpenSearch-shaped lexical service.
pub struct HttpLexicalIndex {
    client: reqwest::Client,
    base_url: String,
    index_base: String,
}

impl HttpLexicalIndex {
    pub fn new(base_url: String, index_base: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            index_base,
        })
    }
}

#[derive(Deserialize)]
struct SearchResponseBody {
    hits: Vec<LexicalHit>,
}

#[async_trait]
impl LexicalIndex for HttpLexicalIndex {
    async fn ensure_index(&self, tenant_id: &str) -> Result<()> {
        let idx = index_for(&self.index_base, tenant_id);
        let resp = self
            .client
            .put(format!("{}/{}", self.base_url, idx))
            .json(&analyzer_mapping())
            .send()
            .await
            .map_err(|e| AppError::BackendLexicalUnavailable(e.to_string()))?;
        if !resp.status().is_success() && resp.status().as_u16() != 400 {
            return Err(AppError::BackendLexicalUnavailable(format!(
                "ensure_index failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn bulk_upsert(&self, tenant_id: &str, docs: &[ChunkPayload]) -> Result<()> {
        let idx = index_for(&self.index_base, tenant_id);
        let resp = self
            .client
            .post(format!("{}/{}/_bulk_upsert", self.base_url, idx))
            .json(&serde_json::json!({ "docs": docs }))
            .send()
            .await
            .map_err(|e| AppError::BackendLexicalUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AppError::BackendLexicalUnavailable(format!(
                "bulk_upsert failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn bm25_search(
        &self,
        tenant_id: &str,
        repo_id: &str,
        query: &str,
        top_k: usize,
        filters: &QueryFilters,
    ) -> Result<Vec<LexicalHit>> {
        let idx = index_for(&self.index_base, tenant_id);
        let mut filter = vec![serde_json::json!({"term": {"repo_id.keyword": repo_id}})];
        if let Some(lang) = &filters.lang {
            filter.push(serde_json::json!({"term": {"lang": lang}}));
        }
        if let Some(dir_hint) = &filters.dir_hint {
            filter.push(serde_json::json!({"prefix": {"rel_path": dir_hint}}));
        }
        let must_not: Vec<serde_json::Value> = if filters.exclude_tests {
            vec![serde_json::json!({"wildcard": {"rel_path": "*test*"}})]
        } else {
            Vec::new()
        };

        let body = serde_json::json!({
            "size": top_k,
            "query": {
                "bool": {
                    "must": [{"match": {"text": query}}],
                    "filter": filter,
                    "must_not": must_not
                }
            }
        });

        let resp = self
            .client
            .post(format!("{}/{}/_search", self.base_url, idx))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::BackendLexicalUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AppError::BackendLexicalUnavailable(format!(
                "bm25_search failed with status {}",
                resp.status()
            )));
        }
        let parsed: SearchResponseBody = resp
            .json()
            .await
            .map_err(|e| AppError::BackendLexicalUnavailable(e.to_string()))?;
        Ok(parsed.hits)
    }
}
