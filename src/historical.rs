//! Historical ranking: filter the baseline by country and rank the top
//! events by damage score, attaching a per-row loss estimate.

use serde::Serialize;
use tracing::warn;

use crate::dataset::Dataset;
use crate::loss::estimate_loss;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEvent {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub damage_score: f64,
    pub estimated_loss_usd: f64,
}

/// Rank historical events by their damage score, highest first.
///
/// `country` filters by case-insensitive substring; when the filter
/// matches nothing the full dataset is used instead (with a warning),
/// matching the interactive behavior analysts expect.
pub fn top_events(
    dataset: &Dataset,
    baseline_scores: &[f64],
    country: Option<&str>,
    top_n: usize,
    exposure_usd: f64,
    calibration_factor: f64,
) -> Vec<RankedEvent> {
    let filter = country
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase);

    let mut selected: Vec<usize> = dataset
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| match &filter {
            Some(c) => row
                .country
                .as_deref()
                .is_some_and(|rc| rc.to_lowercase().contains(c)),
            None => true,
        })
        .map(|(i, _)| i)
        .collect();

    if selected.is_empty() && filter.is_some() {
        warn!(
            country = country.unwrap_or_default(),
            "no historical records for country filter; using full dataset"
        );
        selected = (0..dataset.len()).collect();
    }

    let mut ranked: Vec<RankedEvent> = selected
        .into_iter()
        .filter_map(|index| {
            let row = &dataset.rows()[index];
            let damage_score = *baseline_scores.get(index)?;
            Some(RankedEvent {
                index,
                name: row.name.clone(),
                country: row.country.clone(),
                latitude: row.latitude,
                longitude: row.longitude,
                damage_score,
                estimated_loss_usd: estimate_loss(damage_score, exposure_usd, calibration_factor),
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.damage_score.total_cmp(&a.damage_score));
    ranked.truncate(top_n);
    ranked
}
