//! Error types for the ensemble_forecast crate

use thiserror::Error;

/// Custom error types for the ensemble_forecast crate
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// Malformed window sizes, fold counts, rates or grids
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A calibration that must pick a winner was given no scoring function
    #[error("No scoring function configured; an un-scored calibration cannot pick a winner")]
    MissingScoringFunction,

    /// A training window reached the prediction target or beyond
    #[error("Leakage risk: {0}")]
    LeakageRisk(String),

    /// Error related to data validation or alignment
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from a model's fit or inference
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, EnsembleError>;
