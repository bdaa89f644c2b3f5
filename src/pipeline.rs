//! Batch detection over a directory of histogram dumps
//!
//! Metrics are independent, so each worker runs the detector over its share
//! of dump files. The store is the only shared state: all records are
//! gathered, sorted, and reconciled against it on the calling thread before
//! notifications go out and the store is persisted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use crate::config::AppConfig;
use crate::expiry::{expiring_probes, listing, subscriber_digests, ReleaseCalendar};
use crate::ingest::{discover_metric_files, load_metric_file, IngestConfig};
use crate::notify::{Notification, Notifier};
use crate::probes::{IgnoredProbes, ProbeCatalog};
use crate::regression::{RegressionDetector, RegressionRecord};
use crate::store::{Deduplicator, NotifiedNames, NotifiedRecordStore};

/// Inputs of one detection run
#[derive(Debug, Clone)]
pub struct DetectOptions {
    /// Directory tree of `<metric>.json` dumps
    pub histograms_dir: PathBuf,
    /// Notified-regression store (read, then rewritten)
    pub store_path: PathBuf,
    /// Probe catalog providing descriptions and subscribers
    pub probes_path: Option<PathBuf>,
    /// Probes never mailed about
    pub ignored_path: Option<PathBuf>,
    /// Worker threads for detection
    pub jobs: usize,
    pub config: AppConfig,
}

/// Outcome of one detection run
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    /// Every regression found, sorted by date then metric
    pub regressions: Vec<RegressionRecord>,
    /// Regressions and re-notifications surfaced by the deduplicator
    pub notifications: Vec<Notification>,
    /// Dump files that could not be processed
    pub skipped_files: Vec<PathBuf>,
    /// Messages handed to the notifier
    pub messages_sent: usize,
}

impl DetectionReport {
    /// True when the (date, metric) pair was seen for the first time in this run
    pub fn is_new(&self, date: NaiveDate, metric_name: &str) -> bool {
        self.first_reports().contains(&(date, metric_name))
    }

    fn first_reports(&self) -> HashSet<(NaiveDate, &str)> {
        self.notifications
            .iter()
            .filter(|n| n.first_report)
            .map(|n| (n.record.date, n.record.metric_name.as_str()))
            .collect()
    }

    /// One line per regression, `[new]` marking first sightings
    pub fn summary_lines(&self) -> Vec<String> {
        let first = self.first_reports();
        self.regressions
            .iter()
            .map(|r| {
                let suffix = if first.contains(&(r.date, r.metric_name.as_str())) {
                    " [new]"
                } else {
                    ""
                };
                format!("Regression found for {}, {}{}", r.metric_name, r.date, suffix)
            })
            .collect()
    }
}

/// Detect regressions in every series of one dump file
pub fn detect_file(
    path: &Path,
    detector: &RegressionDetector,
    ingest: &IngestConfig,
) -> Result<Vec<RegressionRecord>> {
    let metric = load_metric_file(path, ingest)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let mut records = Vec::new();
    for (filter_path, series) in &metric.series {
        let found = detector
            .detect_filtered(series, &metric.metric_name, filter_path)
            .with_context(|| {
                format!(
                    "Detection failed for {} [{}]",
                    metric.metric_name,
                    filter_path.join("/")
                )
            })?;
        records.extend(found);
    }
    Ok(records)
}

/// Run detection over `files` on up to `jobs` scoped worker threads
///
/// Files that fail to load or detect are returned separately; results are
/// independent of `jobs`.
pub fn detect_files(
    files: &[PathBuf],
    detector: &RegressionDetector,
    ingest: &IngestConfig,
    jobs: usize,
) -> Result<(Vec<RegressionRecord>, Vec<PathBuf>)> {
    if files.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let jobs = jobs.clamp(1, files.len());
    let chunk_size = files.len().div_ceil(jobs);

    let per_worker = crossbeam::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move |_| {
                    chunk
                        .iter()
                        .map(|path| (path.clone(), detect_file(path, detector, ingest)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>()
    })
    .map_err(|_| anyhow!("Detection worker pool panicked"))?;

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for worker in per_worker {
        let results = worker.map_err(|_| anyhow!("Detection worker panicked"))?;
        for (path, result) in results {
            match result {
                Ok(found) => records.extend(found),
                Err(e) => {
                    tracing::warn!("Skipping {}: {:#}", path.display(), e);
                    skipped.push(path);
                }
            }
        }
    }

    records.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.metric_name.cmp(&b.metric_name))
            .then_with(|| a.filter_path.cmp(&b.filter_path))
    });
    Ok((records, skipped))
}

/// Full run: detect, deduplicate, notify, persist
pub fn run_detection(options: &DetectOptions, notifier: &mut dyn Notifier) -> Result<DetectionReport> {
    let detector = RegressionDetector::new(options.config.detector.clone())?;

    let files = discover_metric_files(&options.histograms_dir).with_context(|| {
        format!(
            "Failed to scan histogram directory: {}",
            options.histograms_dir.display()
        )
    })?;
    tracing::info!("Analyzing {} histogram dumps", files.len());

    let (regressions, skipped_files) =
        detect_files(&files, &detector, &options.config.ingest, options.jobs)?;

    let catalog = match &options.probes_path {
        Some(path) => ProbeCatalog::from_file(path)?,
        None => ProbeCatalog::default(),
    };
    let ignored = match &options.ignored_path {
        Some(path) => IgnoredProbes::from_file(path)?,
        None => IgnoredProbes::default(),
    };

    let mut store = NotifiedRecordStore::load(&options.store_path);
    let notifications = Deduplicator::new(&catalog)
        .with_ignored(&ignored)
        .filter_new(regressions.clone(), &mut store);

    let mut messages_sent = 0;
    for notification in &notifications {
        for message in notification.messages(&options.config.alert.from_addr) {
            notifier.send(&message)?;
            messages_sent += 1;
        }
    }

    store
        .save(&options.store_path)
        .with_context(|| format!("Failed to save {}", options.store_path.display()))?;

    Ok(DetectionReport {
        regressions,
        notifications,
        skipped_files,
        messages_sent,
    })
}

/// Inputs of one expiry run
#[derive(Debug, Clone)]
pub struct ExpiryOptions {
    pub probes_path: PathBuf,
    pub calendar_path: PathBuf,
    pub today: NaiveDate,
    /// Names already mailed about; only consulted and updated when sending
    pub notified_path: Option<PathBuf>,
    /// Send digests instead of only listing
    pub send: bool,
    pub config: AppConfig,
}

/// Outcome of one expiry run
#[derive(Debug, Clone, Default)]
pub struct ExpiryReport {
    /// One line per expiring probe
    pub lines: Vec<String>,
    pub messages_sent: usize,
}

/// List probes expiring `expiry_lead_days` from `today`, optionally mailing digests
pub fn run_expiry(options: &ExpiryOptions, notifier: &mut dyn Notifier) -> Result<ExpiryReport> {
    let catalog = ProbeCatalog::from_file(&options.probes_path)?;
    let calendar = ReleaseCalendar::from_file(&options.calendar_path)?;
    let lead = options.config.alert.expiry_lead()?;

    let expiring = expiring_probes(&catalog, options.today, &calendar, lead);
    let lines = listing(&expiring);
    tracing::info!("{} probes expiring", expiring.len());

    if !options.send {
        return Ok(ExpiryReport {
            lines,
            messages_sent: 0,
        });
    }

    let mut notified = match &options.notified_path {
        Some(path) => NotifiedNames::load(path),
        None => NotifiedNames::default(),
    };

    let digests = subscriber_digests(
        &expiring,
        options.today,
        lead,
        &notified,
        &options.config.alert.from_addr,
    );
    for message in &digests {
        notifier.send(message)?;
    }

    if let Some(path) = &options.notified_path {
        for (name, _) in &expiring {
            notified.insert(*name);
        }
        notified
            .save(path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
    }

    Ok(ExpiryReport {
        lines,
        messages_sent: digests.len(),
    })
}
