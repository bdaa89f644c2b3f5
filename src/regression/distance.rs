// Distance between normalised histograms and dispersion of distance profiles
//
// - Bhattacharyya distance: sqrt(1 - sum_i sqrt(a_i * b_i)), in [0, 1]
//   (0 = identical, 1 = disjoint support)
// - Population standard deviation of a reference window's distances,
//   computed in f64 with a two-pass mean so that thresholds compare exactly

use crate::regression::error::{DetectorError, Result};
use crate::regression::histogram::Distribution;

/// Bhattacharyya distance between two normalised distributions
///
/// Both inputs must have the same number of buckets; a mismatch is rejected
/// with [`DetectorError::ShapeMismatch`] since the metric is undefined across
/// different arities.
///
/// # Example
/// ```
/// use cerberus::regression::{bhattacharyya_distance, normalize, Histogram};
///
/// let a = normalize(&Histogram::new(vec![5.0, 5.0]).unwrap());
/// let b = normalize(&Histogram::new(vec![95.0, 5.0]).unwrap());
/// let d = bhattacharyya_distance(&a, &b).unwrap();
/// assert!((d - 0.3908).abs() < 1e-3);
/// ```
pub fn bhattacharyya_distance(a: &Distribution, b: &Distribution) -> Result<f64> {
    if a.arity() != b.arity() {
        return Err(DetectorError::ShapeMismatch {
            expected: a.arity(),
            found: b.arity(),
        });
    }

    let coefficient: f64 = a
        .values()
        .iter()
        .zip(b.values())
        .map(|(x, y)| (x * y).sqrt())
        .sum();

    // Rounding can push the coefficient a hair above 1 for identical inputs.
    Ok((1.0 - coefficient).max(0.0).sqrt().min(1.0))
}

/// Population standard deviation of a distance profile
///
/// Returns `None` for an empty profile.
pub fn dispersion(distances: &[f64]) -> Option<f64> {
    if distances.is_empty() {
        return None;
    }

    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

    Some(variance.sqrt())
}
