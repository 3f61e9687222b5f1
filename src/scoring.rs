//! # Damage Scoring
//!
//! Combines normalized hazard features into a single composite damage
//! score in [0,1] via a configurable weight vector.
//!
//! Renormalization is a named, unconditional step: the raw weighted sum
//! is *always* divided by the weight sum, so callers never need to
//! pre-normalize weights. A weight vector summing to zero is rejected
//! outright rather than silently producing 0/0.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;
use thiserror::Error;

use crate::dataset::{FEATURE_DEPOSITS, FEATURE_MAGNITUDE, FEATURE_MAX_HEIGHT, FEATURE_RUNUPS};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    /// A required feature column is absent from the row set.
    /// Fatal to the scoring call; surfaced to the caller, never retried.
    #[error("missing required feature in row set: {0}")]
    MissingFeature(String),
    /// The weight vector sums to zero, so renormalization is undefined.
    #[error("weight vector sums to zero; renormalization is undefined")]
    InvalidWeights,
}

/// Relative importance of each feature, keyed by canonical feature name.
///
/// Weights need not sum to 1 — the scorer renormalizes by the sum at
/// evaluation time. Iteration order is deterministic (BTreeMap) so the
/// vector form used by weight calibration is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureWeights(BTreeMap<String, f64>);

impl FeatureWeights {
    /// The baseline weighting this tool ships with.
    pub fn default_seed() -> Self {
        let mut map = BTreeMap::new();
        map.insert(FEATURE_MAGNITUDE.to_string(), 0.3);
        map.insert(FEATURE_MAX_HEIGHT.to_string(), 0.3);
        map.insert(FEATURE_RUNUPS.to_string(), 0.2);
        map.insert(FEATURE_DEPOSITS.to_string(), 0.2);
        Self(map)
    }

    /// Load weights from a JSON file; falls back to `default_seed()` on
    /// any read or parse error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|_| Self::default_seed()),
            Err(_) => Self::default_seed(),
        }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weight values in canonical (sorted-name) order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.values().copied().collect()
    }

    /// Rebuild from a value vector in the same canonical order.
    pub fn with_values(&self, values: &[f64]) -> Self {
        debug_assert_eq!(values.len(), self.0.len());
        Self(
            self.0
                .keys()
                .cloned()
                .zip(values.iter().copied())
                .collect(),
        )
    }
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self::default_seed()
    }
}

/// Hot-reload wrapper around the shared weight vector.
///
/// On each `current()` call the weights file's modified time is checked
/// and the vector reloaded if it changed, so edits to
/// `config/weights.json` take effect without a restart.
#[derive(Debug)]
pub struct HotReloadWeights {
    path: PathBuf,
    inner: RwLock<WeightsState>,
}

#[derive(Debug)]
struct WeightsState {
    weights: FeatureWeights,
    last_modified: Option<SystemTime>,
}

impl HotReloadWeights {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            inner: RwLock::new(WeightsState {
                weights: FeatureWeights::default_seed(),
                last_modified: None,
            }),
        }
    }

    /// A fixed vector detached from any file; reads never reload.
    pub fn pinned(weights: FeatureWeights) -> Self {
        Self {
            path: PathBuf::new(),
            inner: RwLock::new(WeightsState {
                weights,
                last_modified: None,
            }),
        }
    }

    /// Get the latest weights, reloading if the file changed.
    pub fn current(&self) -> FeatureWeights {
        // Fast path: compare mtimes under the read lock.
        let needs_reload = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => {
                let guard = self.inner.read().expect("rwlock poisoned");
                guard.last_modified != Some(mtime)
            }
            // File absent or unreadable: keep what we have.
            Err(_) => false,
        };

        if needs_reload {
            let mut guard = self.inner.write().expect("rwlock poisoned");
            // Double-check in case of races.
            if let Ok(mtime) = std::fs::metadata(&self.path).and_then(|m| m.modified()) {
                if guard.last_modified != Some(mtime) {
                    guard.weights = FeatureWeights::load_from_file(&self.path);
                    guard.last_modified = Some(mtime);
                }
            }
        }

        self.inner.read().expect("rwlock poisoned").weights.clone()
    }

    /// Unconditional reload, regardless of mtime (the admin surface).
    pub fn force_reload(&self) {
        let mtime = std::fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        let fresh = FeatureWeights::load_from_file(&self.path);
        let mut guard = self.inner.write().expect("rwlock poisoned");
        guard.weights = fresh;
        guard.last_modified = mtime;
    }
}

/// Compute the composite damage score for one row of normalized features.
///
/// `raw = Σ w[f]·x[f]`, renormalized by `Σ w[f]`, clamped to [0,1].
/// Pure function; no side effects.
pub fn damage_score(
    normalized: &BTreeMap<String, f64>,
    weights: &FeatureWeights,
) -> Result<f64, ScoreError> {
    let sum = weights.sum();
    if sum == 0.0 {
        return Err(ScoreError::InvalidWeights);
    }

    let mut raw = 0.0;
    for (feature, w) in weights.iter() {
        let x = normalized
            .get(feature)
            .copied()
            .ok_or_else(|| ScoreError::MissingFeature(feature.to_string()))?;
        raw += w * x;
    }

    Ok((raw / sum).clamp(0.0, 1.0))
}
