//! Analyzer configuration, loaded once at startup from TOML.
//!
//! Path resolution: `ANALYZER_CONFIG_PATH` env var, else
//! `config/analyzer.toml`. A missing file yields built-in defaults so
//! the service still boots in a bare checkout.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::dataset::SchemaMap;
use crate::locate::{FuzzyMatcher, NameMatcher, SubstringMatcher};

pub const DEFAULT_CONFIG_PATH: &str = "config/analyzer.toml";
pub const ENV_CONFIG_PATH: &str = "ANALYZER_CONFIG_PATH";

pub const DEFAULT_WEIGHTS_PATH: &str = "config/weights.json";
pub const ENV_WEIGHTS_PATH: &str = "ANALYZER_WEIGHTS_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    #[default]
    Fuzzy,
    Substring,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub dataset_path: String,
    pub schema: SchemaMap,
    /// Exposure used when a score request does not supply one.
    pub exposure_usd: f64,
    pub calibration_factor: f64,
    /// Amplification assumed for sites the dataset does not know.
    pub default_amplification: f64,
    pub nearby_radius_km: f64,
    pub nearby_limit: usize,
    pub matcher: MatcherKind,
    /// Confidence floor for the fuzzy matcher, [0,100].
    pub min_match_confidence: f64,
    pub region_cache_ttl_secs: u64,
    pub port: u16,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            dataset_path: "data/world_tsunamis.csv".to_string(),
            schema: SchemaMap::default(),
            exposure_usd: 1.0e9,
            calibration_factor: 1.0,
            default_amplification: 0.0,
            nearby_radius_km: 50.0,
            nearby_limit: 10,
            matcher: MatcherKind::Fuzzy,
            min_match_confidence: FuzzyMatcher::DEFAULT_MIN_CONFIDENCE,
            region_cache_ttl_secs: 3600,
            port: 8080,
        }
    }
}

impl AnalyzerConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let config = Self::from_toml_str(&text)?;
                info!(path = %path.display(), "analyzer config loaded");
                Ok(config)
            }
            Err(_) => {
                info!(path = %path.display(), "no analyzer config; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Instantiate the configured matcher strategy.
    pub fn build_matcher(&self) -> Box<dyn NameMatcher> {
        match self.matcher {
            MatcherKind::Fuzzy => Box::new(FuzzyMatcher::new(self.min_match_confidence)),
            MatcherKind::Substring => Box::new(SubstringMatcher),
        }
    }
}

/// Path of the weights file, honoring `ANALYZER_WEIGHTS_PATH`.
pub fn weights_path() -> PathBuf {
    std::env::var(ENV_WEIGHTS_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_WEIGHTS_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = AnalyzerConfig::from_toml_str("").unwrap();
        assert_eq!(config.nearby_limit, 10);
        assert_eq!(config.matcher, MatcherKind::Fuzzy);
        assert_eq!(config.default_amplification, 0.0);
    }

    #[test]
    fn fields_override_defaults() {
        let toml = r#"
dataset_path = "data/custom.csv"
matcher = "substring"
nearby_radius_km = 120.0
default_amplification = 0.5
"#;
        let config = AnalyzerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.dataset_path, "data/custom.csv");
        assert_eq!(config.matcher, MatcherKind::Substring);
        assert_eq!(config.nearby_radius_km, 120.0);
        assert_eq!(config.default_amplification, 0.5);
        // Untouched fields keep defaults.
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn schema_section_is_configurable() {
        let toml = r#"
[schema]
magnitude = ["Mw"]
"#;
        let config = AnalyzerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.schema.magnitude, vec!["Mw".to_string()]);
        // Unlisted roles keep their seed synonyms.
        assert!(config.schema.latitude.contains(&"Latitude".to_string()));
    }
}
