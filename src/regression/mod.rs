// Histogram regression detection
//
// Given a chronological series of per-day bucket counts for one metric, find
// the days where the distribution shape moved away from a stable trailing
// reference window and stayed there.
//
// Pipeline per candidate day:
// - sufficiency check on raw counts (enough samples in total and in the peak bucket)
// - normalisation to a probability distribution
// - Bhattacharyya distance to every usable reference day
// - decision: enough references, nearest one far away, distances tightly grouped
// - confirmation: the following `nr_future_days` days must also be suspicious
//
// The core performs no I/O; ingestion and reporting live in sibling modules.

mod config;
mod detector;
mod distance;
mod error;
mod histogram;
mod window;

pub use config::DetectorConfig;
pub use detector::{detect, RegressionDetector, RegressionRecord};
pub use distance::{bhattacharyya_distance, dispersion};
pub use error::{DetectorError, Result};
pub use histogram::{has_not_enough_data, is_sufficient, normalize, Distribution, Histogram, Series};
pub use window::{compare_range, Evidence};
