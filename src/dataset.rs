//! # Dataset
//!
//! Loads the historical tsunami table into an immutable, position-indexed
//! `Dataset` of `FeatureRow`s.
//!
//! - Column headers are resolved once at load time through a `SchemaMap`
//!   (role → accepted header spellings), never re-derived per call.
//! - The four hazard features are required; amplification, coordinates,
//!   names and country are optional.
//! - Rows with an unparsable required field are dropped with a warning,
//!   so downstream math never sees NaN.

use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Canonical feature names recognized by the scorer.
pub const FEATURE_MAGNITUDE: &str = "magnitude";
pub const FEATURE_MAX_HEIGHT: &str = "max_height";
pub const FEATURE_RUNUPS: &str = "runups";
pub const FEATURE_DEPOSITS: &str = "deposits";
pub const FEATURE_AMPLIFICATION: &str = "amplification";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column in data: {0}")]
    MissingColumn(String),
}

/// One historical (or synthetic) record. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub magnitude: f64,
    pub max_height: f64,
    pub runups: f64,
    pub deposits: f64,
    pub amplification: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub name: Option<String>,
    pub country: Option<String>,
}

impl FeatureRow {
    /// Look up a feature value by canonical name.
    pub fn feature(&self, name: &str) -> Option<f64> {
        match name {
            FEATURE_MAGNITUDE => Some(self.magnitude),
            FEATURE_MAX_HEIGHT => Some(self.max_height),
            FEATURE_RUNUPS => Some(self.runups),
            FEATURE_DEPOSITS => Some(self.deposits),
            FEATURE_AMPLIFICATION => Some(self.amplification),
            _ => None,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Maps semantic roles to accepted CSV header spellings.
///
/// The first listed header found in the file wins. `default_seed()`
/// mirrors the headers of the NOAA world-tsunamis export this tool was
/// built against.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaMap {
    #[serde(default = "seed_magnitude")]
    pub magnitude: Vec<String>,
    #[serde(default = "seed_max_height")]
    pub max_height: Vec<String>,
    #[serde(default = "seed_runups")]
    pub runups: Vec<String>,
    #[serde(default = "seed_deposits")]
    pub deposits: Vec<String>,
    #[serde(default = "seed_amplification")]
    pub amplification: Vec<String>,
    #[serde(default = "seed_latitude")]
    pub latitude: Vec<String>,
    #[serde(default = "seed_longitude")]
    pub longitude: Vec<String>,
    #[serde(default = "seed_name")]
    pub name: Vec<String>,
    #[serde(default = "seed_country")]
    pub country: Vec<String>,
}

fn seed_magnitude() -> Vec<String> {
    vec!["Earthquake Magnitude".into(), "Magnitude".into()]
}
fn seed_max_height() -> Vec<String> {
    vec!["Maximum Water Height (m)".into(), "Max Water Height (m)".into()]
}
fn seed_runups() -> Vec<String> {
    vec!["Number of Runups".into(), "Runups".into()]
}
fn seed_deposits() -> Vec<String> {
    vec!["Deposits".into()]
}
fn seed_amplification() -> Vec<String> {
    vec!["City Factor".into(), "Amplification Factor".into()]
}
fn seed_latitude() -> Vec<String> {
    vec!["Latitude".into(), "Lat".into(), "latitude".into(), "LAT".into()]
}
fn seed_longitude() -> Vec<String> {
    vec!["Longitude".into(), "Lon".into(), "longitude".into(), "LON".into()]
}
fn seed_name() -> Vec<String> {
    vec!["Location Name".into(), "Location".into(), "Place".into(), "Name".into()]
}
fn seed_country() -> Vec<String> {
    vec!["Country".into()]
}

impl Default for SchemaMap {
    fn default() -> Self {
        Self {
            magnitude: seed_magnitude(),
            max_height: seed_max_height(),
            runups: seed_runups(),
            deposits: seed_deposits(),
            amplification: seed_amplification(),
            latitude: seed_latitude(),
            longitude: seed_longitude(),
            name: seed_name(),
            country: seed_country(),
        }
    }
}

/// Column indices resolved against one concrete header row.
#[derive(Debug, Clone)]
struct ResolvedSchema {
    magnitude: usize,
    max_height: usize,
    runups: usize,
    deposits: usize,
    amplification: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
    name: Option<usize>,
    country: Option<usize>,
}

impl SchemaMap {
    fn resolve(&self, headers: &csv::StringRecord) -> Result<ResolvedSchema, DatasetError> {
        let find = |candidates: &[String]| -> Option<usize> {
            candidates
                .iter()
                .find_map(|c| headers.iter().position(|h| h.trim() == c))
        };
        let require = |candidates: &[String]| -> Result<usize, DatasetError> {
            find(candidates).ok_or_else(|| DatasetError::MissingColumn(candidates[0].clone()))
        };

        Ok(ResolvedSchema {
            magnitude: require(&self.magnitude)?,
            max_height: require(&self.max_height)?,
            runups: require(&self.runups)?,
            deposits: require(&self.deposits)?,
            amplification: find(&self.amplification),
            latitude: find(&self.latitude),
            longitude: find(&self.longitude),
            name: find(&self.name),
            country: find(&self.country),
        })
    }
}

/// Ordered, read-only sequence of `FeatureRow`s. Owned by the caller;
/// the scoring core only reads it or works on a disposable extended copy.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<FeatureRow>,
}

impl Dataset {
    pub fn from_rows(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn load_csv<P: AsRef<Path>>(path: P, schema: &SchemaMap) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, schema)
    }

    pub fn from_reader<R: Read>(reader: R, schema: &SchemaMap) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let resolved = schema.resolve(rdr.headers()?)?;

        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for record in rdr.records() {
            let record = record?;
            match parse_row(&record, &resolved) {
                Some(row) => rows.push(row),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(dropped, kept = rows.len(), "dropped rows with unparsable hazard fields");
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Extract one feature column across all rows.
    /// `None` for feature names the data model does not know.
    pub fn feature_column(&self, name: &str) -> Option<Vec<f64>> {
        if !is_known_feature(name) {
            return None;
        }
        Some(
            self.rows
                .iter()
                .filter_map(|r| r.feature(name))
                .collect(),
        )
    }
}

pub fn is_known_feature(name: &str) -> bool {
    matches!(
        name,
        FEATURE_MAGNITUDE
            | FEATURE_MAX_HEIGHT
            | FEATURE_RUNUPS
            | FEATURE_DEPOSITS
            | FEATURE_AMPLIFICATION
    )
}

fn parse_row(record: &csv::StringRecord, schema: &ResolvedSchema) -> Option<FeatureRow> {
    let num = |idx: usize| -> Option<f64> {
        record
            .get(idx)
            .and_then(|s| s.trim().parse::<f64>().ok())
            // "NaN" and "inf" parse successfully but would poison the
            // min-max bounds downstream.
            .filter(|v| v.is_finite())
    };
    let opt_num = |idx: Option<usize>| -> Option<f64> { idx.and_then(num) };
    let opt_text = |idx: Option<usize>| -> Option<String> {
        idx.and_then(|i| record.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    Some(FeatureRow {
        magnitude: num(schema.magnitude)?,
        max_height: num(schema.max_height)?,
        runups: num(schema.runups)?,
        deposits: num(schema.deposits)?,
        amplification: opt_num(schema.amplification).unwrap_or(0.0),
        latitude: opt_num(schema.latitude),
        longitude: opt_num(schema.longitude),
        name: opt_text(schema.name),
        country: opt_text(schema.country),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Country,Location Name,Latitude,Longitude,Earthquake Magnitude,Maximum Water Height (m),Number of Runups,Deposits
Japan,Sendai,38.26,140.87,9.1,9.3,5,2
USA,Crescent City,41.75,-124.2,8.6,4.8,3,1
Chile,Coquimbo,-29.95,-71.35,8.3,4.5,2,1
";

    #[test]
    fn loads_rows_with_default_schema() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes(), &SchemaMap::default()).unwrap();
        assert_eq!(ds.len(), 3);
        let row = &ds.rows()[0];
        assert_eq!(row.name.as_deref(), Some("Sendai"));
        assert_eq!(row.country.as_deref(), Some("Japan"));
        assert_eq!(row.magnitude, 9.1);
        assert_eq!(row.amplification, 0.0);
        assert_eq!(row.coordinates(), Some((38.26, 140.87)));
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let csv = "Country,Latitude\nJapan,38.0\n";
        let err = Dataset::from_reader(csv.as_bytes(), &SchemaMap::default()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(_)));
    }

    #[test]
    fn rows_with_unparsable_hazard_fields_are_dropped() {
        let csv = "\
Earthquake Magnitude,Maximum Water Height (m),Number of Runups,Deposits
9.0,5.0,4,2
not-a-number,3.0,2,1
";
        let ds = Dataset::from_reader(csv.as_bytes(), &SchemaMap::default()).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn non_finite_hazard_values_are_dropped() {
        let csv = "\
Earthquake Magnitude,Maximum Water Height (m),Number of Runups,Deposits,Latitude,Longitude
9.0,5.0,4,2,38.0,140.0
NaN,3.0,2,1,10.0,20.0
8.0,inf,1,1,10.0,20.0
8.5,4.0,3,1,NaN,20.0
";
        let ds = Dataset::from_reader(csv.as_bytes(), &SchemaMap::default()).unwrap();
        // NaN/inf in a required column drops the row entirely.
        assert_eq!(ds.len(), 2);
        // A non-finite optional coordinate only clears that field.
        assert_eq!(ds.rows()[1].latitude, None);
        assert!(ds
            .feature_column(FEATURE_MAGNITUDE)
            .unwrap()
            .iter()
            .all(|v| v.is_finite()));
    }

    #[test]
    fn feature_column_by_canonical_name() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes(), &SchemaMap::default()).unwrap();
        let col = ds.feature_column(FEATURE_MAGNITUDE).unwrap();
        assert_eq!(col, vec![9.1, 8.6, 8.3]);
        assert!(ds.feature_column("no_such_feature").is_none());
    }

    #[test]
    fn schema_accepts_alternate_headers() {
        let csv = "Magnitude,Max Water Height (m),Runups,Deposits,Lat,Lon\n8.0,3.0,2,1,10.0,20.0\n";
        let ds = Dataset::from_reader(csv.as_bytes(), &SchemaMap::default()).unwrap();
        assert_eq!(ds.rows()[0].coordinates(), Some((10.0, 20.0)));
    }
}
