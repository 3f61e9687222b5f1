//! Report assembly: percentile rank against the baseline distribution
//! and the nearby-events context around a resolved reference point.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dataset::Dataset;
use crate::locate::{rows_within_radius, MatchResult};

/// Percentile of `score` within the baseline distribution:
/// `100 · count(baseline < score) / count(baseline)`, in [0,100].
/// An empty baseline yields 0.
pub fn percentile_rank(baseline: &[f64], score: f64) -> f64 {
    let below = baseline.iter().filter(|s| **s < score).count();
    100.0 * below as f64 / baseline.len().max(1) as f64
}

/// One historical event in the nearby-context listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyEvent {
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub distance_km: f64,
    pub damage_score: f64,
}

/// Identity of the matched historical record, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedRecord {
    #[serde(flatten)]
    pub result: MatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Final result record for one scenario evaluation. Owned entirely by
/// the caller; constructed fresh per query.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Composite damage score in [0,1].
    pub score: f64,
    /// Percentile rank vs the baseline score distribution, [0,100].
    pub percentile: f64,
    pub estimated_loss_usd: f64,
    /// `None` is the NoMatch outcome; the report then stands alone
    /// without historical anchoring.
    #[serde(rename = "match")]
    pub matched: Option<MatchedRecord>,
    /// Sorted descending by damage score, truncated to the caller's
    /// limit.
    pub nearby: Vec<NearbyEvent>,
    pub generated_at: DateTime<Utc>,
}

/// Collect events within `radius_km` of the reference point, attach each
/// row's own damage score, sort descending by score, truncate to `limit`.
pub fn nearby_events(
    dataset: &Dataset,
    baseline_scores: &[f64],
    ref_lat: f64,
    ref_lon: f64,
    radius_km: f64,
    limit: usize,
) -> Vec<NearbyEvent> {
    let mut out: Vec<NearbyEvent> = rows_within_radius(dataset, ref_lat, ref_lon, radius_km)
        .into_iter()
        .filter_map(|(index, distance_km)| {
            let row = &dataset.rows()[index];
            let (latitude, longitude) = row.coordinates()?;
            Some(NearbyEvent {
                index,
                latitude,
                longitude,
                name: row.name.clone(),
                distance_km,
                damage_score: *baseline_scores.get(index)?,
            })
        })
        .collect();

    out.sort_by(|a, b| b.damage_score.total_cmp(&a.damage_score));
    out.truncate(limit);
    out
}
