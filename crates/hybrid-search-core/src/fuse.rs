//! Score normalization and fusion: the arithmetic core of hybrid retrieval.

use std::collections::HashMap;

/// Degenerate-range threshold below which min-max normalization would
/// divide by (near) zero; scores collapse to the neutral midpoint instead.
const DEGENERATE_RANGE_EPSILON: f64 = 1e-9;

/// Default reciprocal rank fusion constant, used when the caller has no
/// configured `rrf_k` (e.g. in isolated unit tests of this module).
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Min-max normalize a map of id -> raw score into `[0, 1]`.
///
/// When every score is equal (including the single-element and empty
/// cases), every id gets `0.5` rather than dividing by zero.
pub fn normalize(scores: &HashMap<String, f64>) -> HashMap<String, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let min = scores.values().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range.abs() < DEGENERATE_RANGE_EPSILON {
        return scores.keys().map(|k| (k.clone(), 0.5)).collect();
    }
    scores
        .iter()
        .map(|(k, v)| (k.clone(), (v - min) / range))
        .collect()
}

/// Weighted linear fusion of two already-normalized score maps.
///
/// An id missing from one side contributes `0.0` for that side. `alpha` and
/// `beta` are taken as explicit parameters (not looked up from shared
/// state) so the caller can pass per-request A/B weights without mutating
/// anything the engine shares across concurrent requests.
///
/// Returns a `Vec` rather than a map: callers need the fused score *and* a
/// deterministic iteration order (first-seen in `order`) so that a later
/// stable sort on score preserves input order for ties, per the engine's
/// tie-break contract. `order` should be the candidate id union in
/// first-seen order (vector results, then lexical results).
pub fn fuse(
    vnorm: &HashMap<String, f64>,
    bnorm: &HashMap<String, f64>,
    order: &[String],
    alpha: f64,
    beta: f64,
) -> Vec<(String, f64)> {
    order
        .iter()
        .map(|id| {
            let v = vnorm.get(id).copied().unwrap_or(0.0);
            let b = bnorm.get(id).copied().unwrap_or(0.0);
            (id.clone(), alpha * v + beta * b)
        })
        .collect()
}

/// Reciprocal rank fusion fallback, used only when both raw score sets are
/// empty (no vector hits and no lexical hits, but candidates still exist
/// from, say, a learned-ranker-only pass).
///
/// `ranked_sets` is one ranked id list per retrieval source, best-first.
pub fn rrf_fusion(ranked_sets: &[Vec<String>], weight: f64, k: f64) -> HashMap<String, f64> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    for set in ranked_sets {
        for (rank, id) in set.iter().enumerate() {
            let contribution = weight / (k + (rank + 1) as f64);
            *scores.entry(id.clone()).or_insert(0.0) += contribution;
        }
    }
    scores
}
