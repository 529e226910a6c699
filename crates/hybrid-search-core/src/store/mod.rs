//! External backend adapters: the vector index and the lexical index.
//!
//! Both backends live outside the process (HTTP services shaped like
//! Qdrant and OpenSearch respectively); the traits here are the seam the
//! search engine fans out across, and the `Http*` implementations are thin
//! HTTP clients built the way the rest of this crate builds them.

pub mod lexical;
pub mod vector;

pub use lexical::{HttpLexicalIndex, LexicalHit, LexicalIndex};
pub use vector::{HttpVectorIndex, VectorHit, VectorIndex};

/// Filters common to both backends' tenant-scoped search calls.
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub lang: Option<String>,
    pub dir_hint: Option<String>,
    pub exclude_tests: bool,
}
