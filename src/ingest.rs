//! Histogram dump ingestion
//!
//! The exporter writes one `<metric>.json` file per probe, each holding an
//! array of measures:
//!
//! ```json
//! [{"measure": "GC_MS", "filter": ["saved_session", "Firefox", "WINNT"],
//!   "kind": "exponential", "date": "2015-03-01T00:00:00.000Z",
//!   "buckets": [0, 1, 2], "values": [10, 20, 30]}]
//! ```
//!
//! Measures are grouped once into a flat list of `(filter path, series)`
//! pairs; measures sharing a filter path and calendar day are summed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::regression::{DetectorError, Histogram, Series};

/// Leading filter values identifying one series of a metric
pub type FilterPath = Vec<String>;

/// Errors that can occur while reading histogram dumps
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid measure date: {0:?}")]
    InvalidDate(String),

    #[error("Invalid histogram: {0}")]
    Histogram(#[from] DetectorError),

    #[error("Invalid dump JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How measures are grouped into series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of leading filter values forming the filter path
    pub filter_depth: usize,

    /// Keep only measures whose filter path starts with these values
    pub filter_prefix: Option<Vec<String>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            filter_depth: 3,
            filter_prefix: None,
        }
    }
}

/// One exporter measure (a single day's histogram for one filter combination)
#[derive(Debug, Clone, Deserialize)]
pub struct Measure {
    #[serde(default)]
    pub measure: Option<String>,
    #[serde(default)]
    pub filter: Vec<String>,
    #[serde(default)]
    pub kind: Option<String>,
    pub date: String,
    #[serde(default)]
    pub buckets: Vec<f64>,
    pub values: Vec<f64>,
}

impl Measure {
    /// Calendar day of the measure (first ten characters, `YYYY-MM-DD`)
    pub fn day(&self) -> Result<NaiveDate, IngestError> {
        self.date
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .ok_or_else(|| IngestError::InvalidDate(self.date.clone()))
    }

    fn histogram(&self) -> Result<Histogram, IngestError> {
        let hist = Histogram::new(self.values.clone())?;
        if self.buckets.len() == self.values.len() {
            let labels = self.buckets.iter().map(|b| b.to_string()).collect();
            Ok(hist.with_labels(labels)?)
        } else {
            Ok(hist)
        }
    }
}

/// All series of one metric file
#[derive(Debug, Clone)]
pub struct MetricSeries {
    pub metric_name: String,
    pub series: Vec<(FilterPath, Series)>,
}

/// Group measures by filter path and sum same-day histograms
pub fn group_measures(
    measures: &[Measure],
    config: &IngestConfig,
) -> Result<Vec<(FilterPath, Series)>, IngestError> {
    let mut grouped: BTreeMap<FilterPath, Series> = BTreeMap::new();

    for measure in measures {
        let path: FilterPath = measure
            .filter
            .iter()
            .take(config.filter_depth)
            .cloned()
            .collect();

        if let Some(prefix) = &config.filter_prefix {
            if !path.starts_with(prefix) {
                continue;
            }
        }

        let day = measure.day()?;
        grouped
            .entry(path)
            .or_default()
            .accumulate(day, measure.histogram()?)?;
    }

    Ok(grouped.into_iter().collect())
}

/// Parse a dump file's contents
pub fn parse_dump(json: &str) -> Result<Vec<Measure>, IngestError> {
    Ok(serde_json::from_str(json)?)
}

/// Load one `<metric>.json` dump; the metric name is the file stem
pub fn load_metric_file(path: &Path, config: &IngestConfig) -> Result<MetricSeries, IngestError> {
    let metric_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let measures = parse_dump(&fs::read_to_string(path)?)?;
    tracing::debug!("Processing {} ({} measures)", path.display(), measures.len());

    Ok(MetricSeries {
        metric_name,
        series: group_measures(&measures, config)?,
    })
}

/// Recursively list `*.json` files under `dir`, sorted by path
pub fn discover_metric_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
