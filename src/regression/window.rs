// Window comparator: one day against a trailing reference window
//
// The candidate is compared to each usable reference day, oldest first. The
// comparison is suspicious only when enough references were usable, the
// nearest usable reference is far enough away, and all references agree with
// each other (tight dispersion of distances).

use std::ops::Range;

use chrono::NaiveDate;

use crate::regression::config::DetectorConfig;
use crate::regression::distance::{bhattacharyya_distance, dispersion};
use crate::regression::error::Result;
use crate::regression::histogram::{has_not_enough_data, normalize, Distribution, Histogram};

/// The pair of distributions that made a comparison suspicious
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    /// Day that was compared
    pub candidate_date: NaiveDate,
    /// Normalised histogram of the compared day
    pub candidate: Distribution,
    /// Nearest-in-time usable reference day
    pub reference_date: NaiveDate,
    /// Normalised histogram of that reference day
    pub reference: Distribution,
    /// Distance between candidate and nearest reference
    pub distance: f64,
    /// Population standard deviation of all reference distances
    pub dispersion: f64,
    /// Number of reference days that passed the sufficiency check
    pub valid_references: usize,
}

/// Compare `entries[idx]` against the reference days `reference`
///
/// `entries` must be in ascending date order. Reference days failing the
/// sufficiency check are skipped, as are indices outside `entries`. Returns
/// `Ok(None)` when no usable reference exists or the decision rule does not
/// fire, and an error only on a bucket-count mismatch.
pub fn compare_range(
    entries: &[(NaiveDate, &Histogram)],
    idx: usize,
    reference: Range<usize>,
    config: &DetectorConfig,
) -> Result<Option<Evidence>> {
    let Some(&(candidate_date, hist)) = entries.get(idx) else {
        return Ok(None);
    };
    let candidate = normalize(hist);
    tracing::debug!("Comparing {}", candidate_date);

    let mut distances = Vec::new();
    let mut nearest: Option<(NaiveDate, Distribution)> = None;

    for jdx in reference {
        let Some(&(ref_date, ref_hist)) = entries.get(jdx) else {
            continue;
        };

        if has_not_enough_data(ref_hist, config) {
            tracing::debug!("Reference {} has not enough data", ref_date);
            continue;
        }

        let ref_dist = normalize(ref_hist);
        let distance = bhattacharyya_distance(&candidate, &ref_dist)?;
        tracing::debug!("To {}: distance {:.4}", ref_date, distance);

        distances.push(distance);
        nearest = Some((ref_date, ref_dist));
    }

    let (Some((reference_date, reference)), Some(&last), Some(spread)) =
        (nearest, distances.last(), dispersion(&distances))
    else {
        tracing::debug!("No comparable reference data for {}", candidate_date);
        return Ok(None);
    };

    tracing::debug!(
        "Bhattacharyya distance: {:.4}, standard deviation of distances: {:.4}",
        last,
        spread
    );

    if distances.len() >= config.min_valid_references()
        && last > config.distance_threshold
        && spread <= config.stability_threshold
    {
        tracing::debug!("Suspicious difference found for {}", candidate_date);
        Ok(Some(Evidence {
            candidate_date,
            candidate,
            reference_date,
            reference,
            distance: last,
            dispersion: spread,
            valid_references: distances.len(),
        }))
    } else {
        tracing::debug!("No suspicious difference found for {}", candidate_date);
        Ok(None)
    }
}
