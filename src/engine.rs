//! # Scenario Engine
//!
//! Orchestrates one scenario evaluation end to end: extend a disposable
//! copy of the baseline columns with the scenario, normalize over the
//! union, score, rank against the baseline distribution, resolve the
//! location, and assemble the report.
//!
//! The engine never mutates the shared baseline table. Every evaluation
//! works on its own extended copy of the feature columns, so concurrent
//! evaluations against the same baseline observe identical
//! normalization bounds.

use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::dataset::Dataset;
use crate::locate::{resolve, LocationQuery, NameMatcher};
use crate::loss::estimate_loss;
use crate::normalize::{normalize, normalize_value};
use crate::report::{nearby_events, percentile_rank, MatchedRecord, Report};
use crate::scoring::{damage_score, FeatureWeights, ScoreError};

/// User-supplied hazard parameters for a synthetic scenario. Exists only
/// transiently inside one scoring call.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioQuery {
    pub magnitude: f64,
    pub max_height: f64,
    pub runups: f64,
    pub deposits: f64,
    /// Site amplification; when absent the engine's configured default
    /// applies.
    #[serde(default)]
    pub amplification: Option<f64>,
}

impl ScenarioQuery {
    fn feature(&self, name: &str, default_amplification: f64) -> Option<f64> {
        match name {
            crate::dataset::FEATURE_MAGNITUDE => Some(self.magnitude),
            crate::dataset::FEATURE_MAX_HEIGHT => Some(self.max_height),
            crate::dataset::FEATURE_RUNUPS => Some(self.runups),
            crate::dataset::FEATURE_DEPOSITS => Some(self.deposits),
            crate::dataset::FEATURE_AMPLIFICATION => {
                Some(self.amplification.unwrap_or(default_amplification))
            }
            _ => None,
        }
    }
}

/// Per-evaluation knobs, resolved by the caller (API layer or tests)
/// from request fields and configured defaults.
#[derive(Debug, Clone)]
pub struct EvalParams {
    pub exposure_usd: f64,
    pub calibration_factor: f64,
    pub location: Option<LocationQuery>,
    pub nearby_radius_km: f64,
    pub nearby_limit: usize,
}

pub struct ScenarioEngine {
    dataset: Dataset,
    matcher: Box<dyn NameMatcher>,
    default_amplification: f64,
}

impl ScenarioEngine {
    pub fn new(
        dataset: Dataset,
        matcher: Box<dyn NameMatcher>,
        default_amplification: f64,
    ) -> Self {
        Self {
            dataset,
            matcher,
            default_amplification,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Damage scores for every baseline row, normalized over the
    /// baseline columns only, using the given weights.
    pub fn score_baseline(&self, weights: &FeatureWeights) -> Result<Vec<f64>, ScoreError> {
        let mut normalized_columns: Vec<(String, Vec<f64>)> = Vec::with_capacity(weights.len());
        for (feature, _) in weights.iter() {
            let column = self
                .dataset
                .feature_column(feature)
                .ok_or_else(|| ScoreError::MissingFeature(feature.to_string()))?;
            normalized_columns.push((feature.to_string(), normalize(&column)));
        }

        let n = self.dataset.len();
        let mut scores = Vec::with_capacity(n);
        for i in 0..n {
            let features: BTreeMap<String, f64> = normalized_columns
                .iter()
                .map(|(name, col)| (name.clone(), col[i]))
                .collect();
            scores.push(damage_score(&features, weights)?);
        }
        Ok(scores)
    }

    /// The scenario's feature values normalized against the union of
    /// baseline and scenario, keyed by feature name.
    pub fn normalized_scenario(
        &self,
        scenario: &ScenarioQuery,
        weights: &FeatureWeights,
    ) -> Result<BTreeMap<String, f64>, ScoreError> {
        let mut out = BTreeMap::new();
        for (feature, _) in weights.iter() {
            let mut column = self
                .dataset
                .feature_column(feature)
                .ok_or_else(|| ScoreError::MissingFeature(feature.to_string()))?;
            let value = scenario
                .feature(feature, self.default_amplification)
                .ok_or_else(|| ScoreError::MissingFeature(feature.to_string()))?;
            // Disposable extended copy: append, normalize, discard.
            column.push(value);
            out.insert(feature.to_string(), normalize_value(&column, value));
        }
        Ok(out)
    }

    /// Score a scenario and assemble the full report.
    pub fn evaluate(
        &self,
        scenario: &ScenarioQuery,
        weights: &FeatureWeights,
        params: &EvalParams,
    ) -> Result<Report, ScoreError> {
        let normalized = self.normalized_scenario(scenario, weights)?;
        let score = damage_score(&normalized, weights)?;

        let baseline_scores = self.score_baseline(weights)?;
        let percentile = percentile_rank(&baseline_scores, score);
        let estimated_loss_usd =
            estimate_loss(score, params.exposure_usd, params.calibration_factor);

        let matched = params.location.as_ref().and_then(|query| {
            resolve(query, &self.dataset, self.matcher.as_ref()).map(|result| {
                let row = &self.dataset.rows()[result.index];
                MatchedRecord {
                    result,
                    name: row.name.clone(),
                    country: row.country.clone(),
                    latitude: row.latitude,
                    longitude: row.longitude,
                }
            })
        });

        // Reference point: query coordinates when given, else the
        // matched row's coordinates.
        let reference = params
            .location
            .as_ref()
            .and_then(|q| q.coordinates())
            .or_else(|| {
                matched
                    .as_ref()
                    .and_then(|m| match (m.latitude, m.longitude) {
                        (Some(lat), Some(lon)) => Some((lat, lon)),
                        _ => None,
                    })
            });

        let nearby = match reference {
            Some((lat, lon)) => nearby_events(
                &self.dataset,
                &baseline_scores,
                lat,
                lon,
                params.nearby_radius_km,
                params.nearby_limit,
            ),
            None => Vec::new(),
        };

        Ok(Report {
            score,
            percentile,
            estimated_loss_usd,
            matched,
            nearby,
            generated_at: Utc::now(),
        })
    }

    /// Resolve a standalone location query (the `/locate` surface).
    pub fn locate(&self, query: &LocationQuery) -> Option<crate::locate::MatchResult> {
        resolve(query, &self.dataset, self.matcher.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureRow;
    use crate::locate::FuzzyMatcher;

    fn bare_row(magnitude: f64, max_height: f64, runups: f64, deposits: f64) -> FeatureRow {
        FeatureRow {
            magnitude,
            max_height,
            runups,
            deposits,
            amplification: 0.0,
            latitude: None,
            longitude: None,
            name: None,
            country: None,
        }
    }

    fn engine() -> ScenarioEngine {
        let dataset = Dataset::from_rows(vec![
            bare_row(5.0, 1.0, 0.0, 0.0),
            bare_row(8.0, 3.0, 2.0, 1.0),
            bare_row(9.0, 5.0, 4.0, 2.0),
        ]);
        ScenarioEngine::new(dataset, Box::new(FuzzyMatcher::default()), 0.0)
    }

    fn params() -> EvalParams {
        EvalParams {
            exposure_usd: 1_000_000_000.0,
            calibration_factor: 1.0,
            location: None,
            nearby_radius_km: 50.0,
            nearby_limit: 10,
        }
    }

    #[test]
    fn worked_scenario_end_to_end() {
        let engine = engine();
        let scenario = ScenarioQuery {
            magnitude: 8.5,
            max_height: 5.0,
            runups: 3.0,
            deposits: 2.0,
            amplification: None,
        };
        let report = engine
            .evaluate(&scenario, &FeatureWeights::default_seed(), &params())
            .unwrap();
        assert!((report.score - 0.9125).abs() < 1e-12);
        assert!((report.estimated_loss_usd - 912_500_000.0).abs() < 1e-3);
        // Baseline scores are 0, 0.575, 1.0 → two strictly below.
        assert!((report.percentile - 200.0 / 3.0).abs() < 1e-9);
        assert!(report.matched.is_none());
        assert!(report.nearby.is_empty());
    }

    #[test]
    fn normalized_scenario_shares_extended_bounds() {
        let engine = engine();
        let scenario = ScenarioQuery {
            magnitude: 8.5,
            max_height: 5.0,
            runups: 3.0,
            deposits: 2.0,
            amplification: None,
        };
        let x = engine
            .normalized_scenario(&scenario, &FeatureWeights::default_seed())
            .unwrap();
        assert!((x["magnitude"] - 0.875).abs() < 1e-12);
        assert!((x["max_height"] - 1.0).abs() < 1e-12);
        assert!((x["runups"] - 0.75).abs() < 1e-12);
        assert!((x["deposits"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn baseline_is_not_mutated_by_evaluation() {
        let engine = engine();
        let before = engine.dataset().rows().to_vec();
        let scenario = ScenarioQuery {
            magnitude: 9.9,
            max_height: 30.0,
            runups: 50.0,
            deposits: 9.0,
            amplification: Some(1.0),
        };
        let _ = engine
            .evaluate(&scenario, &FeatureWeights::default_seed(), &params())
            .unwrap();
        assert_eq!(engine.dataset().rows(), before.as_slice());
        assert_eq!(engine.dataset().len(), 3);
    }

    #[test]
    fn unknown_weight_feature_surfaces_missing_feature() {
        let engine = engine();
        let scenario = ScenarioQuery {
            magnitude: 8.0,
            max_height: 2.0,
            runups: 1.0,
            deposits: 1.0,
            amplification: None,
        };
        let weights = FeatureWeights::from_pairs([("magnitude", 0.5), ("subsidence", 0.5)]);
        let err = engine.evaluate(&scenario, &weights, &params()).unwrap_err();
        assert_eq!(err, ScoreError::MissingFeature("subsidence".into()));
    }

    #[test]
    fn default_amplification_applies_when_scenario_omits_it() {
        let dataset = Dataset::from_rows(vec![
            FeatureRow {
                amplification: 0.0,
                ..bare_row(5.0, 1.0, 0.0, 0.0)
            },
            FeatureRow {
                amplification: 1.0,
                ..bare_row(9.0, 5.0, 4.0, 2.0)
            },
        ]);
        let engine = ScenarioEngine::new(dataset, Box::new(FuzzyMatcher::default()), 0.5);
        let scenario = ScenarioQuery {
            magnitude: 7.0,
            max_height: 3.0,
            runups: 2.0,
            deposits: 1.0,
            amplification: None,
        };
        let weights = FeatureWeights::from_pairs([("amplification", 1.0)]);
        let x = engine.normalized_scenario(&scenario, &weights).unwrap();
        assert!((x["amplification"] - 0.5).abs() < 1e-12);
    }
}
