//! Persisted record of regressions already surfaced
//!
//! Layout (shared with the dashboard that renders it):
//!
//! ```json
//! {"2015-03-08": {"GC_MS": {"description": "...", "alert_emails": ["..."],
//!   "buckets": ["0", "1"], "regression": [0.95, 0.05], "reference": [0.5, 0.5],
//!   "filter": ["saved_session", "Firefox", "WINNT"]}}}
//! ```
//!
//! A missing or unreadable store loads as empty. Saving writes a temporary
//! file next to the target and renames it into place, so a crash never
//! leaves a truncated store. Notifications go out before the store is saved:
//! a crash between the two can repeat them on the next run (at-least-once).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::notify::Notification;
use crate::probes::{IgnoredProbes, ProbeCatalog};
use crate::regression::RegressionRecord;

/// Errors that can occur while persisting a store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to persist store to {path}: {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },
}

/// Stored payload for one (date, metric) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredRegression {
    #[serde(default)]
    pub description: String,
    /// Everyone notified so far
    #[serde(default)]
    pub alert_emails: Vec<String>,
    #[serde(default)]
    pub buckets: Vec<String>,
    #[serde(default)]
    pub regression: Vec<f64>,
    #[serde(default)]
    pub reference: Vec<f64>,
    #[serde(default)]
    pub filter: Vec<String>,
}

/// Regressions already surfaced, keyed by ISO date then metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifiedRecordStore {
    entries: BTreeMap<String, BTreeMap<String, StoredRegression>>,
}

impl NotifiedRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store, treating a missing or malformed file as empty
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No notified regressions at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed regression store {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Atomically write the store to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path.as_ref(), &json)
    }

    pub fn contains(&self, date: NaiveDate, metric_name: &str) -> bool {
        self.get(date, metric_name).is_some()
    }

    pub fn get(&self, date: NaiveDate, metric_name: &str) -> Option<&StoredRegression> {
        self.entries
            .get(&date_key(date))
            .and_then(|metrics| metrics.get(metric_name))
    }

    fn get_mut(&mut self, date: NaiveDate, metric_name: &str) -> Option<&mut StoredRegression> {
        self.entries
            .get_mut(&date_key(date))
            .and_then(|metrics| metrics.get_mut(metric_name))
    }

    pub fn insert(&mut self, date: NaiveDate, metric_name: &str, stored: StoredRegression) {
        self.entries
            .entry(date_key(date))
            .or_default()
            .insert(metric_name.to_string(), stored);
    }

    /// Number of (date, metric) pairs
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in (date, metric) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &StoredRegression)> {
        self.entries.iter().flat_map(|(date, metrics)| {
            metrics
                .iter()
                .map(move |(metric, stored)| (date.as_str(), metric.as_str(), stored))
        })
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Write `bytes` to a temp file beside `path`, then rename over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let persist_err = |source: std::io::Error| StoreError::Persist {
        path: path.display().to_string(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
    tmp.write_all(bytes).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

/// Suppresses regressions that were already surfaced
///
/// Keyed by (date, metric name). A pair seen for the first time is inserted
/// into the store and surfaced to every current subscriber. A pair already in
/// the store is only surfaced again to subscribers added since, who are then
/// appended to the stored recipient list.
#[derive(Debug, Clone, Copy)]
pub struct Deduplicator<'a> {
    catalog: &'a ProbeCatalog,
    ignored: Option<&'a IgnoredProbes>,
}

impl<'a> Deduplicator<'a> {
    pub fn new(catalog: &'a ProbeCatalog) -> Self {
        Self {
            catalog,
            ignored: None,
        }
    }

    /// Probes whose regressions are stored but never mailed
    pub fn with_ignored(mut self, ignored: &'a IgnoredProbes) -> Self {
        self.ignored = Some(ignored);
        self
    }

    /// Filter `records` against `store`, updating the store in memory
    pub fn filter_new(
        &self,
        records: Vec<RegressionRecord>,
        store: &mut NotifiedRecordStore,
    ) -> Vec<Notification> {
        let mut notifications = Vec::new();

        for record in records {
            let subscribers = self.subscribers(&record.metric_name);
            let description = self.catalog.description(&record.metric_name).to_string();

            match store.get_mut(record.date, &record.metric_name) {
                None => {
                    tracing::info!(
                        "New regression for {}, {}",
                        record.metric_name,
                        record.date
                    );
                    store.insert(
                        record.date,
                        &record.metric_name,
                        StoredRegression {
                            description: description.clone(),
                            alert_emails: subscribers.clone(),
                            buckets: record.labels.clone().unwrap_or_default(),
                            regression: record.candidate.clone(),
                            reference: record.reference.clone(),
                            filter: record.filter_path.clone(),
                        },
                    );
                    notifications.push(Notification {
                        record,
                        description,
                        recipients: subscribers,
                        first_report: true,
                    });
                }
                Some(stored) => {
                    let known: BTreeSet<&String> = stored.alert_emails.iter().collect();
                    let added: Vec<String> = subscribers
                        .into_iter()
                        .filter(|s| !known.contains(s))
                        .collect();

                    if added.is_empty() {
                        tracing::debug!(
                            "Already reported {}, {}",
                            record.metric_name,
                            record.date
                        );
                        continue;
                    }

                    tracing::info!(
                        "Notifying {} new subscriber(s) of {}, {}",
                        added.len(),
                        record.metric_name,
                        record.date
                    );
                    stored.alert_emails.extend(added.iter().cloned());
                    notifications.push(Notification {
                        record,
                        description,
                        recipients: added,
                        first_report: false,
                    });
                }
            }
        }

        notifications
    }

    fn subscribers(&self, metric_name: &str) -> Vec<String> {
        if self.ignored.is_some_and(|i| i.contains(metric_name)) {
            return Vec::new();
        }
        self.catalog.subscribers(metric_name).to_vec()
    }
}

/// Set of probe names already notified (expiry notifications)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifiedNames(BTreeSet<String>);

impl NotifiedNames {
    /// Load the set, treating a missing or malformed file as empty
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        fs::read_to_string(path)
            .ok()
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(names) => Some(names),
                Err(e) => {
                    tracing::warn!("Ignoring malformed notified list {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path.as_ref(), &json)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn as_set(&self) -> &BTreeSet<String> {
        &self.0
    }
}
