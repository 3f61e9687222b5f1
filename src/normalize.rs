//! Min-max feature normalization.
//!
//! Normalization always runs over the *entire* working column — baseline
//! rows plus the one appended scenario value — so a synthetic scenario is
//! commensurable with the historical distribution. That shared scaling is
//! what makes the percentile rank in the report meaningful.

/// Min-max scale a column into [0,1].
///
/// A constant column (including a single-row input) maps to all zeros:
/// a feature with no variance contributes no signal to the score.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    match min_max(values) {
        Some((min, max)) if max > min => {
            values.iter().map(|v| (v - min) / (max - min)).collect()
        }
        _ => vec![0.0; values.len()],
    }
}

/// Scale a single value against the bounds of `values`.
/// Degenerate bounds (constant or empty column) map to 0.
pub fn normalize_value(values: &[f64], v: f64) -> f64 {
    match min_max(values) {
        Some((min, max)) if max > min => (v - min) / (max - min),
        _ => 0.0,
    }
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    let mut min = first;
    let mut max = first;
    for v in iter {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    Some((min, max))
}
