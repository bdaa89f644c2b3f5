// Per-day histograms, date-ordered series and normalisation
//
// A `Histogram` is a fixed-arity vector of non-negative bucket counts. A
// `Series` maps calendar days to histograms for one metric and filter path;
// keys are unique and iteration is always chronological.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::regression::config::DetectorConfig;
use crate::regression::error::{DetectorError, Result};

/// Bucket counts for one metric on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHistogram")]
pub struct Histogram {
    counts: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
}

/// Unchecked wire form; converted through [`Histogram::new`]
#[derive(Deserialize)]
struct RawHistogram {
    counts: Vec<f64>,
    #[serde(default)]
    labels: Option<Vec<String>>,
}

impl TryFrom<RawHistogram> for Histogram {
    type Error = DetectorError;

    fn try_from(raw: RawHistogram) -> Result<Self> {
        let hist = Histogram::new(raw.counts)?;
        match raw.labels {
            Some(labels) => hist.with_labels(labels),
            None => Ok(hist),
        }
    }
}

impl Histogram {
    /// Build a histogram, rejecting negative or non-finite counts
    pub fn new(counts: Vec<f64>) -> Result<Self> {
        if let Some((index, &value)) = counts
            .iter()
            .enumerate()
            .find(|(_, c)| !c.is_finite() || **c < 0.0)
        {
            return Err(DetectorError::InvalidCount { index, value });
        }

        Ok(Self {
            counts,
            labels: None,
        })
    }

    /// Attach bucket-boundary labels (must match the bucket count)
    pub fn with_labels(mut self, labels: Vec<String>) -> Result<Self> {
        if labels.len() != self.counts.len() {
            return Err(DetectorError::ShapeMismatch {
                expected: self.counts.len(),
                found: labels.len(),
            });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Number of buckets
    pub fn arity(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Count in the most populated bucket (0 for an empty histogram)
    pub fn peak(&self) -> f64 {
        self.counts.iter().copied().fold(0.0, f64::max)
    }

    /// Element-wise add `other` into this histogram
    pub fn accumulate(&mut self, other: &Histogram) -> Result<()> {
        if other.arity() != self.arity() {
            return Err(DetectorError::ShapeMismatch {
                expected: self.arity(),
                found: other.arity(),
            });
        }
        for (acc, c) in self.counts.iter_mut().zip(&other.counts) {
            *acc += c;
        }
        if self.labels.is_none() {
            self.labels = other.labels.clone();
        }
        Ok(())
    }
}

/// Histogram rescaled to sum to one (or the zero vector)
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution(Vec<f64>);

impl Distribution {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

/// Rescale a histogram to a probability distribution
///
/// An all-zero histogram is returned unchanged as the zero vector. Callers on
/// the detection path never reach this case because such days fail the
/// sufficiency check first.
pub fn normalize(hist: &Histogram) -> Distribution {
    let total = hist.total();
    if total == 0.0 {
        return Distribution(hist.counts.clone());
    }
    Distribution(hist.counts.iter().map(|c| c / total).collect())
}

/// True when a day carries too few samples to compare meaningfully
///
/// Evaluated on raw counts: the day is rejected when the total is below
/// `min_total_count` or when no single bucket reaches `min_peak_count`.
pub fn has_not_enough_data(hist: &Histogram, config: &DetectorConfig) -> bool {
    hist.total() < config.min_total_count || hist.peak() < config.min_peak_count
}

/// Negation of [`has_not_enough_data`]
pub fn is_sufficient(hist: &Histogram, config: &DetectorConfig) -> bool {
    !has_not_enough_data(hist, config)
}

/// Chronological per-day histograms for one metric and filter path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    days: BTreeMap<NaiveDate, Histogram>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the histogram for `date`, enforcing uniform arity
    pub fn insert(&mut self, date: NaiveDate, hist: Histogram) -> Result<Option<Histogram>> {
        self.check_arity(&hist)?;
        Ok(self.days.insert(date, hist))
    }

    /// Sum `hist` into the histogram already stored for `date`
    pub fn accumulate(&mut self, date: NaiveDate, hist: Histogram) -> Result<()> {
        self.check_arity(&hist)?;
        match self.days.get_mut(&date) {
            Some(existing) => existing.accumulate(&hist),
            None => {
                self.days.insert(date, hist);
                Ok(())
            }
        }
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&Histogram> {
        self.days.get(date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Bucket count shared by every day (None for an empty series)
    pub fn arity(&self) -> Option<usize> {
        self.days.values().next().map(Histogram::arity)
    }

    /// Days in ascending date order
    pub fn entries(&self) -> Vec<(NaiveDate, &Histogram)> {
        self.days.iter().map(|(d, h)| (*d, h)).collect()
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.days.keys()
    }

    fn check_arity(&self, hist: &Histogram) -> Result<()> {
        match self.arity() {
            Some(expected) if expected != hist.arity() => Err(DetectorError::ShapeMismatch {
                expected,
                found: hist.arity(),
            }),
            _ => Ok(()),
        }
    }
}

impl FromIterator<(NaiveDate, Histogram)> for Series {
    /// Collects without arity checks; use [`Series::insert`] for untrusted input
    fn from_iter<I: IntoIterator<Item = (NaiveDate, Histogram)>>(iter: I) -> Self {
        Self {
            days: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist(counts: &[f64]) -> Histogram {
        Histogram::new(counts.to_vec()).unwrap()
    }

    #[test]
    fn test_deserialize_validates_counts() {
        let ok: Histogram =
            serde_json::from_str(r#"{"counts": [1.0, 2.0], "labels": ["0", "10"]}"#).unwrap();
        assert_eq!(ok.counts(), &[1.0, 2.0]);
        assert_eq!(ok.labels().unwrap().len(), 2);

        assert!(serde_json::from_str::<Histogram>(r#"{"counts": [1.0, -2.0]}"#).is_err());
        assert!(
            serde_json::from_str::<Histogram>(r#"{"counts": [1.0], "labels": ["0", "10"]}"#)
                .is_err()
        );
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 3, d).unwrap()
    }

    #[test]
    fn test_rejects_negative_count() {
        let err = Histogram::new(vec![1.0, -2.0]).unwrap_err();
        assert_eq!(
            err,
            DetectorError::InvalidCount {
                index: 1,
                value: -2.0
            }
        );
    }

    #[test]
    fn test_labels_must_match_arity() {
        let h = hist(&[1.0, 2.0]);
        assert!(h.clone().with_labels(vec!["0".into()]).is_err());
        let h = h.with_labels(vec!["0".into(), "10".into()]).unwrap();
        assert_eq!(h.labels().unwrap()[1], "10");
    }

    #[test]
    fn test_normalize_sums_to_one() {
        let d = normalize(&hist(&[1.0, 3.0]));
        assert_eq!(d.values(), &[0.25, 0.75]);
    }

    #[test]
    fn test_normalize_zero_histogram_is_identity() {
        let d = normalize(&hist(&[0.0, 0.0, 0.0]));
        assert_eq!(d.values(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_has_not_enough_data() {
        let config = DetectorConfig::default();

        // Spread out: total is fine, no bucket reaches the peak threshold
        assert!(has_not_enough_data(&hist(&[500.0, 500.0]), &config));
        // Concentrated but low volume
        assert!(has_not_enough_data(&hist(&[999.0, 0.0]), &config));
        // All zero
        assert!(has_not_enough_data(&hist(&[0.0, 0.0]), &config));
        // Empty
        assert!(has_not_enough_data(&hist(&[]), &config));

        assert!(is_sufficient(&hist(&[1000.0, 0.0]), &config));
        assert!(is_sufficient(&hist(&[5000.0, 5000.0]), &config));
    }

    #[test]
    fn test_series_orders_by_date() {
        let mut series = Series::new();
        series.insert(day(3), hist(&[3.0])).unwrap();
        series.insert(day(1), hist(&[1.0])).unwrap();
        series.insert(day(2), hist(&[2.0])).unwrap();

        let dates: Vec<_> = series.entries().into_iter().map(|(d, _)| d).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
    }

    #[test]
    fn test_series_rejects_arity_change() {
        let mut series = Series::new();
        series.insert(day(1), hist(&[1.0, 2.0])).unwrap();
        let err = series.insert(day(2), hist(&[1.0])).unwrap_err();
        assert_eq!(
            err,
            DetectorError::ShapeMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_series_accumulate_sums_same_day() {
        let mut series = Series::new();
        series.accumulate(day(1), hist(&[1.0, 2.0])).unwrap();
        series.accumulate(day(1), hist(&[10.0, 20.0])).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.get(&day(1)).unwrap().counts(), &[11.0, 22.0]);
    }
}
