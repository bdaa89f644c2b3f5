//! Probe definitions (`Histograms.json`-style catalog)
//!
//! Supplies the metadata attached to regressions at reporting time: the
//! human-readable description and the list of alert subscribers. Also carries
//! the expiry version used by the expiry notifier.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Definition of one probe; unknown fields are ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeDefinition {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub alert_emails: Vec<String>,

    #[serde(default)]
    pub expires_in_version: Option<String>,
}

/// All known probes, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbeCatalog {
    probes: BTreeMap<String, ProbeDefinition>,
}

impl ProbeCatalog {
    /// Load a probe catalog from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read probe definitions: {}", path.as_ref().display())
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse probe definitions")
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: ProbeDefinition) {
        self.probes.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&ProbeDefinition> {
        self.probes.get(name)
    }

    /// Alert subscribers of a probe (empty for unknown probes)
    pub fn subscribers(&self, name: &str) -> &[String] {
        self.get(name)
            .map(|p| p.alert_emails.as_slice())
            .unwrap_or_default()
    }

    /// Description of a probe (empty for unknown probes)
    pub fn description(&self, name: &str) -> &str {
        self.get(name)
            .and_then(|p| p.description.as_deref())
            .unwrap_or_default()
    }

    /// Probes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProbeDefinition)> {
        self.probes.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

/// Probes whose regressions are recorded but never mailed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgnoredProbes(BTreeSet<String>);

impl IgnoredProbes {
    /// Load a JSON array of probe names; a missing file means nothing is ignored
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No ignored probe list at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ignored probes: {}", path.display()))?;
        let names: BTreeSet<String> =
            serde_json::from_str(&content).context("Failed to parse ignored probe list")?;
        Ok(Self(names))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

impl FromIterator<String> for IgnoredProbes {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
