//! # Weight Calibration
//!
//! Re-projects a weight vector onto the constraint set implied by one
//! ground-truth example, without discarding the analyst's prior weights.
//!
//! Given normalized features `x`, current weights `w0` and a target
//! score, we find the `w` closest to `w0` in Euclidean distance subject
//! to `w·x = target` and `Σw = 1`. With `A = [x; 1ᵏ]` and
//! `b = [target, 1]`, the least-squares projection onto that affine
//! subspace is `w = w0 − Aᵗ(AAᵗ)⁻¹(A·w0 − b)`; `AAᵗ` is only 2×2, so
//! it is inverted directly.
//!
//! The optional non-negativity post-process (clip negatives, then
//! renormalize to Σw = 1) generally *violates* the original equality
//! constraint `w·x = target`. It is a usability compromise, not an
//! exact solve, and callers relying on the exact constraint must leave
//! it off.

use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("feature vector and weight vector lengths differ ({features} vs {weights})")]
    LengthMismatch { features: usize, weights: usize },
}

/// Singularity guard for the 2×2 system.
const DET_EPSILON: f64 = 1e-12;

/// Project `w0` onto the affine subspace `{w : w·x = target, Σw = 1}`.
///
/// If the two constraints are linearly dependent (e.g. `x` proportional
/// to the all-ones vector) the projection is ill-posed; the original
/// `w0` is returned unchanged and the degenerate case is logged at info
/// level.
pub fn project_weights(
    x: &[f64],
    w0: &[f64],
    target_score: f64,
    clip_negative: bool,
) -> Result<Vec<f64>, ProjectionError> {
    if x.len() != w0.len() {
        return Err(ProjectionError::LengthMismatch {
            features: x.len(),
            weights: w0.len(),
        });
    }
    let k = x.len() as f64;

    // AAᵗ = [[Σx², Σx], [Σx, k]]
    let s_xx: f64 = x.iter().map(|v| v * v).sum();
    let s_x: f64 = x.iter().sum();
    let det = s_xx * k - s_x * s_x;
    if det.abs() < DET_EPSILON {
        info!(
            det,
            "degenerate projection constraints; returning weights unchanged"
        );
        return Ok(w0.to_vec());
    }

    // Residual r = A·w0 − b.
    let dot_xw: f64 = x.iter().zip(w0).map(|(a, b)| a * b).sum();
    let sum_w: f64 = w0.iter().sum();
    let r0 = dot_xw - target_score;
    let r1 = sum_w - 1.0;

    // y = (AAᵗ)⁻¹·r via the 2×2 adjugate.
    let y0 = (k * r0 - s_x * r1) / det;
    let y1 = (-s_x * r0 + s_xx * r1) / det;

    // w = w0 − Aᵗ·y, where Aᵗ·y has components x_i·y0 + y1.
    let mut w: Vec<f64> = x
        .iter()
        .zip(w0)
        .map(|(xi, wi)| wi - (xi * y0 + y1))
        .collect();

    if clip_negative {
        for v in &mut w {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
        let sum: f64 = w.iter().sum();
        if sum == 0.0 {
            // Everything clipped away; nothing sensible to renormalize.
            return Ok(w0.to_vec());
        }
        for v in &mut w {
            *v /= sum;
        }
    }

    Ok(w)
}
