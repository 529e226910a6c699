//! The hybrid search engine: dense/lexical fan-out, fusion, and the
//! optional learned-ranker re-sort.

pub mod engine;
pub mod reranker;

pub use engine::{HybridSearchEngine, SearchOptions, SearchOutcome};
pub use reranker::CrossEncoderReranker;
