//! Core data model: chunks, tenants, candidates, and log events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A contiguous span of source lines extracted at an AST boundary on the
/// client, identified by a stable id within a tenant.
///
/// Invariants: `line_start <= line_end`; `privacy_mode` implies `vector`
/// is present and `text` is absent; non-privacy implies `text` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    pub repo_id: String,
    #[serde(default)]
    pub lang: Option<String>,
    pub path_tokens: Vec<String>,
    #[serde(default)]
    pub rel_path: Option<String>,
    #[serde(default)]
    pub is_test: bool,
    pub line_start: i64,
    pub line_end: i64,
    #[serde(default)]
    pub privacy_mode: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

pub fn default_tenant() -> String {
    "default".to_string()
}

impl Chunk {
    /// Validate the structural invariants a chunk must satisfy before ingestion.
    pub fn validate(&self) -> Result<(), String> {
        if self.line_start > self.line_end {
            return Err(format!(
                "chunk {}: line_start {} > line_end {}",
                self.chunk_id, self.line_start, self.line_end
            ));
        }
        if self.path_tokens.is_empty() {
            return Err(format!("chunk {}: path_tokens must be non-empty", self.chunk_id));
        }
        if self.privacy_mode {
            if self.vector.is_none() {
                return Err(format!("chunk {}: privacy_mode requires vector", self.chunk_id));
            }
        } else if self.text.is_none() {
            return Err(format!("chunk {}: non-privacy chunk requires text", self.chunk_id));
        }
        Ok(())
    }
}

/// A tenant's accepted API keys and salt rotation history.
#[derive(Debug, Clone, Default)]
pub struct Tenant {
    pub tenant_id: String,
    pub api_keys: std::collections::HashSet<String>,
    pub salts: Vec<Salt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salt {
    pub ver: u32,
    pub value: String,
}

impl Tenant {
    /// The current salt is the entry with the maximum `ver`, if any exist.
    pub fn current_salt(&self) -> Option<&Salt> {
        self.salts.iter().max_by_key(|s| s.ver)
    }
}

/// Transient per-query record produced by the hybrid search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridCandidate {
    pub chunk_id: String,
    pub vector_score: f64,
    pub lexical_score: f64,
    pub normalized_vector: f64,
    pub normalized_lexical: f64,
    pub fused: f64,
    pub path_depth: usize,
    pub line_span_length: i64,
    #[serde(skip)]
    pub payload: Option<ChunkPayload>,
}

/// Payload carried alongside a candidate, as returned by either backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkPayload {
    pub chunk_id: String,
    pub repo_id: String,
    pub path_tokens: Vec<String>,
    #[serde(default)]
    pub rel_path: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    pub line_start: i64,
    pub line_end: i64,
    #[serde(default)]
    pub text: Option<String>,
}

/// A/B bucket assignment, deterministic in the search id's last hex digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Control,
    Variant,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Control => "control",
            Bucket::Variant => "variant",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single returned hit, as sent to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f64,
    pub path_tokens: Vec<String>,
    pub line_span: [i64; 2],
    pub repo_id: String,
    pub preview: Option<String>,
}

/// Per-candidate debug record, persisted into the search log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugRecord {
    pub chunk_id: String,
    pub fused: f64,
    pub vnorm: f64,
    pub bnorm: f64,
    pub span: i64,
    pub depth: usize,
}

/// Persistent append-only record of one non-cached search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEvent {
    pub search_id: String,
    pub tenant_id: String,
    pub repo_id: String,
    pub query: String,
    pub timestamp: f64,
    pub bucket: Bucket,
    pub candidates: Vec<DebugRecord>,
}

/// Persistent append-only record of one feedback submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub search_id: String,
    pub clicked_chunk_id: String,
    pub grade: i64,
    pub timestamp: f64,
}

/// Extra filters applied to a search, beyond the mandatory repo equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SearchFilters {
    pub lang: Option<String>,
    pub dir_hint: Option<String>,
    pub exclude_tests: bool,
}

/// Raw per-tenant key file shape: `tenant -> [key, ...]`.
pub type TenantKeyFile = HashMap<String, Vec<String>>;
