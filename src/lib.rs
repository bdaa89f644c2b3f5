//! Cerberus - histogram regression detection for daily telemetry
//!
//! This library detects persistent changes in the shape of daily histogram
//! distributions, deduplicates findings against a persistent store, and
//! notifies probe subscribers. It also reports probes whose expiry version
//! is about to ship.

pub mod cli;
pub mod config;
pub mod expiry;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod probes;
pub mod regression;
pub mod store;
pub mod versions;
