//! Learned ranker: a read-only scorer over fused-candidate feature vectors.
//!
//! The on-disk artifact is a small JSON-serialized linear model (weights +
//! bias, logistic link) rather than a pickled model, since no Rust-native
//! loader for that format exists. The contract the rest of the engine
//! depends on is unchanged: load once at startup, score read-only, never
//! retrain in-process. See DESIGN.md for the substitution rationale.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Feature vector fed to the ranker for one candidate:
/// `[fused, vnorm, bnorm, line_span_length, path_depth]`.
pub type FeatureVector = [f64; 5];

/// A scorer over feature vectors, loaded once and never mutated.
pub trait LearnedRanker: Send + Sync {
    /// Whether a model was actually loaded (absent path degrades gracefully).
    fn available(&self) -> bool;

    /// Score a batch of feature vectors, one output score per input row.
    fn score(&self, features: &[FeatureVector]) -> Result<Vec<f64>>;
}

/// On-disk artifact shape: a logistic-regression-style linear model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub weights: [f64; 5],
    pub bias: f64,
}

impl LinearModelArtifact {
    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    fn predict_one(&self, x: &FeatureVector) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(x.iter())
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias;
        Self::sigmoid(z)
    }
}

/// A ranker backed by a [`LinearModelArtifact`] loaded from a JSON file, or
/// absent entirely when no path is configured or the file doesn't exist.
pub struct FileLearnedRanker {
    model: Option<LinearModelArtifact>,
}

impl FileLearnedRanker {
    /// Load from `path` if given and present on disk; otherwise construct an
    /// unavailable ranker that callers should skip past.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let model = match path {
            Some(p) if Path::new(p).exists() => {
                let raw = std::fs::read_to_string(p)?;
                let artifact: LinearModelArtifact = serde_json::from_str(&raw)?;
                Some(artifact)
            }
            _ => None,
        };
        Ok(Self { model })
    }

    /// Construct directly from an in-memory artifact, for tests and
    /// programmatic configuration.
    pub fn from_artifact(artifact: LinearModelArtifact) -> Self {
        Self {
            model: Some(artifact),
        }
    }
}

impl LearnedRanker for FileLearnedRanker {
    fn available(&self) -> bool {
        self.model.is_some()
    }

    fn score(&self, features: &[FeatureVector]) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| AppError::Internal("learned ranker not loaded".to_string()))?;
        Ok(features.iter().map(|f| model.predict_one(f)).collect())
    }
}
