// Configuration for histogram regression detection
//
// Every policy constant of the detector lives here. Defaults reproduce the
// thresholds the alerting pipeline has always run with.

use serde::{Deserialize, Serialize};

use crate::regression::DetectorError;

/// Configuration for histogram regression detection
///
/// # Example
/// ```
/// use cerberus::regression::DetectorConfig;
///
/// let config = DetectorConfig::default();
/// assert_eq!(config.nr_ref_days, 7);
/// assert_eq!(config.nr_future_days, 2);
/// assert_eq!(config.min_valid_references(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of trailing days forming the reference window
    ///
    /// The window for candidate day `i` is `[max(i - nr_ref_days, 0), i)`.
    ///
    /// Default: 7
    pub nr_ref_days: usize,

    /// Number of following days that must confirm the shift
    ///
    /// A candidate day is only reported when it and each of the next
    /// `nr_future_days` days differ from the same reference window.
    /// The last `nr_future_days` entries of a series are never candidates.
    ///
    /// Default: 2
    pub nr_future_days: usize,

    /// Minimum total sample count for a day to be usable
    ///
    /// Default: 1000
    pub min_total_count: f64,

    /// Minimum count in the most populated bucket for a day to be usable
    ///
    /// Default: 1000
    pub min_peak_count: f64,

    /// Bhattacharyya distance to the nearest valid reference day must be
    /// strictly greater than this to be suspicious
    ///
    /// Default: 0.12
    pub distance_threshold: f64,

    /// Population standard deviation of all reference distances must be less
    /// than or equal to this
    ///
    /// A tight spread means the candidate moved away from a stable baseline
    /// rather than from a noisy one.
    ///
    /// Default: 0.01
    pub stability_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            nr_ref_days: 7,
            nr_future_days: 2,
            min_total_count: 1000.0,
            min_peak_count: 1000.0,
            distance_threshold: 0.12,
            stability_threshold: 0.01,
        }
    }
}

impl DetectorConfig {
    /// Minimum number of valid reference comparisons (`nr_ref_days / 2`, floored)
    pub fn min_valid_references(&self) -> usize {
        self.nr_ref_days / 2
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.nr_ref_days == 0 {
            return Err(DetectorError::InvalidConfig(
                "nr_ref_days must be >= 1, got 0".to_string(),
            ));
        }

        for (name, value) in [
            ("min_total_count", self.min_total_count),
            ("min_peak_count", self.min_peak_count),
            ("stability_threshold", self.stability_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DetectorError::InvalidConfig(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.distance_threshold) {
            return Err(DetectorError::InvalidConfig(format!(
                "distance_threshold must be in [0, 1], got {}",
                self.distance_threshold
            )));
        }

        Ok(())
    }
}
