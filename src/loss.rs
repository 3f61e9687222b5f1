//! Loss estimation and scalar calibration.
//!
//! Pure scalar mappings between the damage-score domain [0,1] and the
//! currency domain, linked by a multiplicative calibration factor.

/// Map a damage score to an estimated USD loss:
/// `score × exposure_usd × calibration_factor`.
///
/// Monotonic (non-decreasing) in each argument while the others are
/// held ≥ 0.
pub fn estimate_loss(score: f64, exposure_usd: f64, calibration_factor: f64) -> f64 {
    score * exposure_usd * calibration_factor
}

/// Solve the calibration factor from one known loss:
/// `factor = actual_loss / (score × exposure_usd)`.
///
/// Returns `None` (not computable) when `score <= 0` or
/// `exposure_usd == 0` — a loss can never be attributed to zero hazard
/// or zero exposed value. This is a normal outcome the caller must
/// branch on, not an error.
pub fn solve_factor(score: f64, actual_loss_usd: f64, exposure_usd: f64) -> Option<f64> {
    if score <= 0.0 || exposure_usd == 0.0 {
        return None;
    }
    Some(actual_loss_usd / (score * exposure_usd))
}
