//! CLI argument parsing for Cerberus

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cerberus")]
#[command(version)]
#[command(about = "Detects persistent shape changes in daily histogram telemetry", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// TOML configuration file ([detector], [ingest], [alert] tables)
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan histogram dumps for regressions and notify subscribers
    Detect(DetectArgs),
    /// List probes expiring soon, optionally mailing their subscribers
    Expiring(ExpiringArgs),
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Directory of <metric>.json histogram dumps
    #[arg(long = "histograms", value_name = "DIR")]
    pub histograms: PathBuf,

    /// Notified-regression store (created if missing)
    #[arg(long = "store", value_name = "FILE")]
    pub store: PathBuf,

    /// Probe definitions (Histograms.json)
    #[arg(long = "probes", value_name = "FILE")]
    pub probes: Option<PathBuf>,

    /// JSON list of probes never to alert about
    #[arg(long = "ignored", value_name = "FILE")]
    pub ignored: Option<PathBuf>,

    /// Write alert messages into this directory instead of logging them
    #[arg(long = "outbox", value_name = "DIR")]
    pub outbox: Option<PathBuf>,

    /// Reference window length in days (overrides config)
    #[arg(long = "ref-days", value_name = "N")]
    pub ref_days: Option<usize>,

    /// Confirmation horizon in days (overrides config)
    #[arg(long = "future-days", value_name = "N")]
    pub future_days: Option<usize>,

    /// Worker threads for detection
    #[arg(short = 'j', long = "jobs", value_name = "N", default_value = "1")]
    pub jobs: usize,
}

#[derive(Args, Debug)]
pub struct ExpiringArgs {
    /// Probe definitions (Histograms.json)
    #[arg(long = "probes", value_name = "FILE")]
    pub probes: PathBuf,

    /// Release calendar: JSON object of version -> YYYY-MM-DD
    #[arg(long = "calendar", value_name = "FILE")]
    pub calendar: PathBuf,

    /// Day to evaluate expiry against (default: today)
    #[arg(long = "today", value_name = "YYYY-MM-DD")]
    pub today: Option<NaiveDate>,

    /// Names of probes already notified about
    #[arg(long = "notified", value_name = "FILE")]
    pub notified: Option<PathBuf>,

    /// Write digests into this directory instead of logging them
    #[arg(long = "outbox", value_name = "DIR")]
    pub outbox: Option<PathBuf>,

    /// Send per-subscriber digests
    #[arg(long = "notify")]
    pub notify: bool,
}
