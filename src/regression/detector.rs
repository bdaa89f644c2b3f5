// Regression detector: slides over a per-metric series
//
// For each candidate day with enough data, the candidate and each of the next
// `nr_future_days` days are compared against the same trailing reference
// window (the `nr_ref_days` days before the candidate). A regression is only
// reported when every one of those comparisons is suspicious, so one-day
// blips are ignored at the cost of `nr_future_days` of latency.

use std::ops::{Range, RangeInclusive};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::regression::config::DetectorConfig;
use crate::regression::error::Result;
use crate::regression::histogram::{has_not_enough_data, Histogram, Series};
use crate::regression::window::{compare_range, Evidence};

/// A confirmed distribution shift for one metric on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionRecord {
    pub date: NaiveDate,
    pub metric_name: String,
    /// Categorical filter values the series was grouped by (may be empty)
    #[serde(default)]
    pub filter_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    /// Normalised histogram of the regressed day
    pub candidate: Vec<f64>,
    /// Normalised histogram of the nearest usable reference day
    pub reference: Vec<f64>,
    pub reference_date: NaiveDate,
    pub distance: f64,
}

/// Detects persistent histogram shape changes in a date-ordered series
///
/// # Example
/// ```
/// use cerberus::regression::{DetectorConfig, Histogram, RegressionDetector, Series};
/// use chrono::NaiveDate;
///
/// let mut series = Series::new();
/// for (i, counts) in [[5000.0, 5000.0]; 7]
///     .into_iter()
///     .chain([[9500.0, 500.0], [9400.0, 600.0], [9600.0, 400.0]])
///     .enumerate()
/// {
///     let date = NaiveDate::from_ymd_opt(2015, 3, i as u32 + 1).unwrap();
///     series.insert(date, Histogram::new(counts.to_vec()).unwrap()).unwrap();
/// }
///
/// let detector = RegressionDetector::new(DetectorConfig::default()).unwrap();
/// let found = detector.detect(&series, "GC_MS").unwrap();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].date, NaiveDate::from_ymd_opt(2015, 3, 8).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegressionDetector {
    config: DetectorConfig,
}

impl RegressionDetector {
    /// Create a detector, validating the configuration
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect regressions in an unfiltered series
    pub fn detect(&self, series: &Series, metric_name: &str) -> Result<Vec<RegressionRecord>> {
        self.detect_filtered(series, metric_name, &[])
    }

    /// Detect regressions in the series for one filter path of a metric
    ///
    /// Records are returned in ascending date order. The last
    /// `nr_future_days` days are never candidates because they cannot be
    /// confirmed yet.
    pub fn detect_filtered(
        &self,
        series: &Series,
        metric_name: &str,
        filter_path: &[String],
    ) -> Result<Vec<RegressionRecord>> {
        let entries = series.entries();
        let nr_future_days = self.config.nr_future_days;
        let mut regressions = Vec::new();

        if entries.len() <= nr_future_days {
            tracing::debug!(
                "{}: {} days, not enough to confirm over {} following days",
                metric_name,
                entries.len(),
                nr_future_days
            );
            return Ok(regressions);
        }

        for (i, &(date, hist)) in entries[..entries.len() - nr_future_days].iter().enumerate() {
            tracing::debug!("Analyzing {} for {}", metric_name, date);

            if has_not_enough_data(hist, &self.config) {
                tracing::debug!("Histogram has not enough data");
                continue;
            }

            let reference = i.saturating_sub(self.config.nr_ref_days)..i;
            let horizon_end = (i + nr_future_days).min(entries.len() - 1);

            let Some(evidence) = self.confirm(&entries, i..=horizon_end, reference)? else {
                continue;
            };

            tracing::info!(
                "Regression found for {}, {} (distance {:.4} to {})",
                metric_name,
                date,
                evidence.distance,
                evidence.reference_date
            );

            regressions.push(RegressionRecord {
                date,
                metric_name: metric_name.to_string(),
                filter_path: filter_path.to_vec(),
                labels: hist.labels().map(<[String]>::to_vec),
                candidate: evidence.candidate.into_vec(),
                reference: evidence.reference.into_vec(),
                reference_date: evidence.reference_date,
                distance: evidence.distance,
            });
        }

        Ok(regressions)
    }

    /// Every day in `horizon` must be suspicious against `reference`;
    /// the evidence kept is the candidate day's own (the first in the horizon)
    fn confirm(
        &self,
        entries: &[(NaiveDate, &Histogram)],
        horizon: RangeInclusive<usize>,
        reference: Range<usize>,
    ) -> Result<Option<Evidence>> {
        let mut first = None;

        for j in horizon {
            match compare_range(entries, j, reference.clone(), &self.config)? {
                Some(evidence) => {
                    if first.is_none() {
                        first = Some(evidence);
                    }
                }
                None => return Ok(None),
            }
        }

        Ok(first)
    }
}

/// Convenience wrapper around [`RegressionDetector::detect`]
pub fn detect(
    series: &Series,
    metric_name: &str,
    config: &DetectorConfig,
) -> Result<Vec<RegressionRecord>> {
    RegressionDetector::new(config.clone())?.detect(series, metric_name)
}
