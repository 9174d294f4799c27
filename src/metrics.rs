//! Metrics for evaluating walk-forward predictions

use crate::error::{EnsembleError, Result};
use serde::{Deserialize, Serialize};

/// Scoring functions used by calibration and by the final model comparison.
///
/// Every variant is oriented so that a higher score is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    /// Fraction of exact class matches
    Accuracy,
    /// Negated mean squared error
    NegMeanSquaredError,
    /// Negated mean absolute error
    NegMeanAbsoluteError,
}

impl Scoring {
    /// Score predictions against actual values; higher is better.
    pub fn compute(&self, predicted: &[f64], actual: &[f64]) -> Result<f64> {
        match self {
            Scoring::Accuracy => accuracy(predicted, actual),
            Scoring::NegMeanSquaredError => Ok(-mean_squared_error(predicted, actual)?),
            Scoring::NegMeanAbsoluteError => Ok(-mean_absolute_error(predicted, actual)?),
        }
    }
}

impl std::fmt::Display for Scoring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scoring::Accuracy => write!(f, "accuracy"),
            Scoring::NegMeanSquaredError => write!(f, "neg_mean_squared_error"),
            Scoring::NegMeanAbsoluteError => write!(f, "neg_mean_absolute_error"),
        }
    }
}

fn check_lengths(predicted: &[f64], actual: &[f64]) -> Result<()> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(EnsembleError::DataError(
            "Predicted and actual values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

/// Fraction of predictions matching the actual class label.
pub fn accuracy(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;

    let hits = predicted
        .iter()
        .zip(actual.iter())
        .filter(|(p, a)| (*p - *a).abs() < 1e-9)
        .count();

    Ok(hits as f64 / predicted.len() as f64)
}

/// Mean squared error between predictions and actual values.
pub fn mean_squared_error(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;

    let sum: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).powi(2))
        .sum();

    Ok(sum / predicted.len() as f64)
}

/// Mean absolute error between predictions and actual values.
pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;

    let sum: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a).abs())
        .sum();

    Ok(sum / predicted.len() as f64)
}
