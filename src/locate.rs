//! # Location Resolver
//!
//! Finds the historical record most relevant to a query, either by place
//! name (fuzzy text match, confidence 0–100) or by coordinates (geodesic
//! nearest neighbor, confidence expressed as distance in km).
//!
//! Name resolution runs first when a name is supplied; the coordinate
//! fallback only kicks in when name matching yields nothing. "No match"
//! is a normal result, not an error — the caller proceeds with a
//! standalone scenario report lacking historical anchoring.
//!
//! Matcher strategies are interchangeable behind `NameMatcher` and
//! selected explicitly at construction time, never discovered through
//! failed fallbacks at call time.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::Dataset;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Either a free-text name or a coordinate pair. When both are present
/// the name takes precedence; coordinates are the fallback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl LocationQuery {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    fn trimmed_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// How confident a match is, depending on which path produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// Name-match similarity in [0,100]; higher is better.
    Name { score: f64 },
    /// Great-circle distance to the query point; lower is better.
    Distance { km: f64 },
}

/// Reference to the matched dataset row. Absence of a `MatchResult`
/// (i.e. `None` from [`resolve`]) is the "no match" outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub index: usize,
    pub confidence: MatchConfidence,
}

/// A pluggable place-name matching strategy.
pub trait NameMatcher: Send + Sync {
    /// Best-matching candidate index and a confidence in [0,100],
    /// or `None` when nothing clears the strategy's bar.
    fn best_match(&self, query: &str, candidates: &[(usize, &str)]) -> Option<(usize, f64)>;

    fn name(&self) -> &'static str;
}

/// Lowercase, collapse whitespace, drop punctuation. Keeps matching
/// resilient to "Sendai," vs "sendai".
fn normalize_place(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Similarity-based matcher backed by `strsim::normalized_levenshtein`,
/// with a containment boost so "Sendai" still matches "Sendai, Japan".
pub struct FuzzyMatcher {
    min_confidence: f64,
}

impl FuzzyMatcher {
    /// Default confidence floor below which candidates are discarded.
    pub const DEFAULT_MIN_CONFIDENCE: f64 = 60.0;

    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_CONFIDENCE)
    }
}

impl NameMatcher for FuzzyMatcher {
    fn best_match(&self, query: &str, candidates: &[(usize, &str)]) -> Option<(usize, f64)> {
        let q = normalize_place(query);
        if q.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in candidates {
            let c = normalize_place(candidate);
            if c.is_empty() {
                continue;
            }
            let mut score = 100.0 * strsim::normalized_levenshtein(&q, &c);
            if c.contains(&q) || q.contains(&c) {
                score = score.max(85.0);
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((*index, score));
            }
        }

        best.filter(|(_, score)| *score >= self.min_confidence)
    }

    fn name(&self) -> &'static str {
        "fuzzy"
    }
}

/// Case-insensitive substring containment; confidence 100 on first hit.
#[derive(Debug, Default)]
pub struct SubstringMatcher;

impl NameMatcher for SubstringMatcher {
    fn best_match(&self, query: &str, candidates: &[(usize, &str)]) -> Option<(usize, f64)> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return None;
        }
        candidates
            .iter()
            .find(|(_, c)| c.to_lowercase().contains(&q))
            .map(|(index, _)| (*index, 100.0))
    }

    fn name(&self) -> &'static str {
        "substring"
    }
}

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1r = lat1.to_radians();
    let lat2r = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Minimum-distance row among rows carrying coordinates.
pub fn nearest_row(dataset: &Dataset, lat: f64, lon: f64) -> Option<(usize, f64)> {
    dataset
        .rows()
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            row.coordinates()
                .map(|(rlat, rlon)| (i, haversine_km(lat, lon, rlat, rlon)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// All rows with coordinates within `radius_km` of the reference point.
pub fn rows_within_radius(
    dataset: &Dataset,
    lat: f64,
    lon: f64,
    radius_km: f64,
) -> Vec<(usize, f64)> {
    dataset
        .rows()
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            row.coordinates()
                .map(|(rlat, rlon)| (i, haversine_km(lat, lon, rlat, rlon)))
        })
        .filter(|(_, d)| *d <= radius_km)
        .collect()
}

/// Resolve a location query against the dataset.
///
/// Order: fuzzy/substring name match over rows that carry a name, then
/// nearest-neighbor over rows that carry coordinates. `None` means no
/// match — a normal outcome.
pub fn resolve(
    query: &LocationQuery,
    dataset: &Dataset,
    matcher: &dyn NameMatcher,
) -> Option<MatchResult> {
    if let Some(name) = query.trimmed_name() {
        let candidates: Vec<(usize, &str)> = dataset
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.name.as_deref().map(|n| (i, n)))
            .collect();
        if let Some((index, score)) = matcher.best_match(name, &candidates) {
            return Some(MatchResult {
                index,
                confidence: MatchConfidence::Name { score },
            });
        }
        debug!(matcher = matcher.name(), query = name, "no name match");
    }

    if let Some((lat, lon)) = query.coordinates() {
        if let Some((index, km)) = nearest_row(dataset, lat, lon) {
            return Some(MatchResult {
                index,
                confidence: MatchConfidence::Distance { km },
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureRow;

    fn row(name: Option<&str>, lat: Option<f64>, lon: Option<f64>) -> FeatureRow {
        FeatureRow {
            magnitude: 8.0,
            max_height: 3.0,
            runups: 2.0,
            deposits: 1.0,
            amplification: 0.0,
            latitude: lat,
            longitude: lon,
            name: name.map(String::from),
            country: None,
        }
    }

    fn sample_dataset() -> Dataset {
        Dataset::from_rows(vec![
            row(Some("Sendai, Japan"), Some(38.26), Some(140.87)),
            row(Some("Crescent City, CA"), Some(41.75), Some(-124.2)),
            row(Some("Coquimbo, Chile"), Some(-29.95), Some(-71.35)),
            row(None, Some(5.55), Some(95.32)),
        ])
    }

    #[test]
    fn haversine_is_symmetric_and_zero_on_identity() {
        let d1 = haversine_km(38.26, 140.87, 41.75, -124.2);
        let d2 = haversine_km(41.75, -124.2, 38.26, 140.87);
        assert!((d1 - d2).abs() < 1e-9);
        assert_eq!(haversine_km(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn name_match_takes_precedence_over_coordinates() {
        let ds = sample_dataset();
        let q = LocationQuery {
            name: Some("Sendai".into()),
            // Coordinates pointing at Crescent City; name must win.
            latitude: Some(41.75),
            longitude: Some(-124.2),
        };
        let m = resolve(&q, &ds, &FuzzyMatcher::default()).unwrap();
        assert_eq!(m.index, 0);
        assert!(matches!(m.confidence, MatchConfidence::Name { score } if score >= 60.0));
    }

    #[test]
    fn unmatched_name_falls_back_to_nearest_neighbor() {
        let ds = sample_dataset();
        let q = LocationQuery {
            name: Some("Atlantis".into()),
            latitude: Some(-30.0),
            longitude: Some(-71.0),
        };
        let m = resolve(&q, &ds, &FuzzyMatcher::default()).unwrap();
        assert_eq!(m.index, 2);
        assert!(matches!(m.confidence, MatchConfidence::Distance { km } if km < 100.0));
    }

    #[test]
    fn absent_name_and_coordinates_is_no_match() {
        let ds = sample_dataset();
        let q = LocationQuery {
            name: Some("Tokyo".into()),
            latitude: None,
            longitude: None,
        };
        assert_eq!(resolve(&q, &ds, &FuzzyMatcher::default()), None);
        assert_eq!(resolve(&LocationQuery::default(), &ds, &FuzzyMatcher::default()), None);
    }

    #[test]
    fn substring_matcher_reports_confidence_100() {
        let ds = sample_dataset();
        let q = LocationQuery {
            name: Some("crescent".into()),
            ..Default::default()
        };
        let m = resolve(&q, &ds, &SubstringMatcher).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.confidence, MatchConfidence::Name { score: 100.0 });
    }

    #[test]
    fn rows_without_coordinates_are_skipped() {
        let ds = Dataset::from_rows(vec![row(Some("Nowhere"), None, None)]);
        assert_eq!(nearest_row(&ds, 0.0, 0.0), None);
        let q = LocationQuery {
            latitude: Some(0.0),
            longitude: Some(0.0),
            ..Default::default()
        };
        assert_eq!(resolve(&q, &ds, &FuzzyMatcher::default()), None);
    }

    #[test]
    fn radius_filter_returns_rows_in_range() {
        let ds = sample_dataset();
        let hits = rows_within_radius(&ds, 38.26, 140.87, 50.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 0);
    }
}
