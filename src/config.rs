//! TOML configuration file
//!
//! ```toml
//! [detector]
//! nr_ref_days = 7
//! nr_future_days = 2
//! distance_threshold = 0.12
//!
//! [ingest]
//! filter_depth = 3
//! filter_prefix = ["saved_session", "Firefox", "WINNT"]
//!
//! [alert]
//! from_addr = "telemetry-alert@mozilla.com"
//! expiry_lead_days = 7
//! ```
//!
//! Every table and field is optional.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::ingest::IngestConfig;
use crate::notify::DEFAULT_FROM_ADDR;
use crate::regression::DetectorConfig;

/// Notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Sender address of alert and expiry mail
    pub from_addr: String,

    /// Days ahead of a release at which expiring probes are reported
    pub expiry_lead_days: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            from_addr: DEFAULT_FROM_ADDR.to_string(),
            expiry_lead_days: 7,
        }
    }
}

impl AlertConfig {
    /// Expiry lead time, rejecting values outside chrono's representable range
    pub fn expiry_lead(&self) -> Result<Duration> {
        Duration::try_days(self.expiry_lead_days).ok_or_else(|| {
            anyhow!(
                "alert.expiry_lead_days out of range: {}",
                self.expiry_lead_days
            )
        })
    }
}

/// Whole-application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub ingest: IngestConfig,
    pub alert: AlertConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.detector.validate()?;
        config.alert.expiry_lead()?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_toml(path),
            None => Ok(Self::default()),
        }
    }
}
