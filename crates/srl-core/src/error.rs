//! Error types for SRL

use thiserror::Error;

/// Main error type for SRL
#[derive(Error, Debug)]
pub enum SafeRlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Missing metric: {0}")]
    MissingMetric(String),

    #[error("Observed cost must be finite, got {0}")]
    NonFiniteCost(f64),
}

impl SafeRlError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

/// Result type alias for SRL operations
pub type Result<T> = std::result::Result<T, SafeRlError>;
