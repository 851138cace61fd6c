//! Duplicate Scorer
//! Mission: turn a feature vector into a duplicate probability (spec.md
//! §4.5), exposed as a pluggable capability so a trained classifier can be
//! swapped for the heuristic fallback without touching call sites
//! (spec.md §9 "Pluggable duplicate scorer").

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::features::{to_canonical_vector, FeatureVector, FEATURE_NAMES};

pub trait DuplicateScorer: Send + Sync {
    fn predict_dup_prob(&self, features: &FeatureVector) -> f64;
    fn model_id(&self) -> &str;
    fn model_version(&self) -> &str;
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Deserialize)]
struct LogisticArtifact {
    model_id: String,
    model_version: String,
    bias: f64,
    /// Keyed by canonical feature name; unknown names are ignored, missing
    /// names contribute 0, per spec.md §4.4.
    weights: std::collections::HashMap<String, f64>,
}

pub struct LogisticClassifier {
    model_id: String,
    model_version: String,
    bias: f64,
    weights: [f64; 13],
}

impl LogisticClassifier {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let artifact: LogisticArtifact = serde_json::from_str(&raw)?;
        let mut weights = [0.0; 13];
        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            weights[i] = *artifact.weights.get(*name).unwrap_or(&0.0);
        }
        Ok(Self {
            model_id: artifact.model_id,
            model_version: artifact.model_version,
            bias: artifact.bias,
            weights,
        })
    }
}

impl DuplicateScorer for LogisticClassifier {
    fn predict_dup_prob(&self, features: &FeatureVector) -> f64 {
        let v = to_canonical_vector(features);
        let z: f64 = self.bias + v.iter().zip(self.weights.iter()).map(|(x, w)| x * w).sum::<f64>();
        sigmoid(z)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}

/// Documented weights for the degraded-mode linear heuristic. Chosen so
/// that an exact invoice-number match or a near-identical line set alone
/// pushes `dup_prob` well past 0.5, while a single weak signal does not.
pub struct HeuristicFallback;

const HEURISTIC_WEIGHTS: [(&str, f64); 6] = [
    ("invnum_edit", -3.0),
    ("line_coverage_pct", 2.5),
    ("same_po", 1.2),
    ("abs_total_diff_pct", -1.5),
    ("days_diff", -0.02),
    ("text_cosine", 1.0),
];
const HEURISTIC_BIAS: f64 = -0.5;

impl DuplicateScorer for HeuristicFallback {
    fn predict_dup_prob(&self, features: &FeatureVector) -> f64 {
        let z: f64 = HEURISTIC_BIAS
            + HEURISTIC_WEIGHTS
                .iter()
                .map(|(name, w)| features.get(*name).copied().unwrap_or(0.0) * w)
                .sum::<f64>();
        sigmoid(z)
    }

    fn model_id(&self) -> &str {
        "heuristic"
    }

    fn model_version(&self) -> &str {
        "heuristic"
    }
}

/// Loads the configured artifact at process start and caches it for the
/// process lifetime (spec.md §4.5, §9 "Process-wide state"). Falls back to
/// the heuristic on load failure or missing path so the service degrades
/// rather than failing (spec.md §7 "Model load failure").
pub fn load_scorer(artifact_path: Option<&str>) -> Box<dyn DuplicateScorer> {
    match artifact_path {
        Some(path) => match LogisticClassifier::load(Path::new(path)) {
            Ok(model) => {
                tracing::info!(model_id = %model.model_id(), model_version = %model.model_version(), "loaded duplicate classifier");
                Box::new(model)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load duplicate classifier, falling back to heuristic");
                Box::new(HeuristicFallback)
            }
        },
        None => {
            tracing::info!("no model artifact configured, using heuristic duplicate scorer");
            Box::new(HeuristicFallback)
        }
    }
}
