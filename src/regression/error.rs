use thiserror::Error;

/// Errors raised by the regression detection core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("Histogram shape mismatch: expected {expected} buckets, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Invalid bucket count at index {index}: {value} (counts must be finite and >= 0)")]
    InvalidCount { index: usize, value: f64 },

    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DetectorError>;
