//! Second-stage models consuming base-model predictions
//!
//! Rows of the core feature matrix are the base models' predictions for one
//! timestamp, one column per model.

use super::{ModelAdapter, Predictor};
use crate::calibration::{HyperGrid, ParamSet};
use crate::config::{OutputType, RunConfig};
use crate::error::{EnsembleError, Result};
use crate::metrics::Scoring;

/// Picks, per training window, the base-model column with the best
/// in-window score and forwards its prediction.
#[derive(Debug, Clone)]
pub struct BestInSample {
    scoring: Scoring,
    chosen: Option<usize>,
}

impl BestInSample {
    pub fn new(scoring: Scoring) -> Self {
        Self {
            scoring,
            chosen: None,
        }
    }

    /// Column picked by the most recent fit.
    pub fn chosen(&self) -> Option<usize> {
        self.chosen
    }
}

impl Predictor for BestInSample {
    fn fit(&mut self, rows: &[Vec<f64>], targets: &[f64], _params: &ParamSet) -> Result<()> {
        let width = rows
            .first()
            .map(|r| r.len())
            .ok_or_else(|| EnsembleError::ModelError("Empty training window".to_string()))?;
        if width == 0 {
            return Err(EnsembleError::ModelError(
                "No base-model columns to choose from".to_string(),
            ));
        }

        let mut best: Option<(usize, f64)> = None;
        for column in 0..width {
            let predictions: Vec<f64> = rows.iter().map(|r| r[column]).collect();
            let score = self.scoring.compute(&predictions, targets)?;
            // strict improvement keeps the first column on ties
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((column, score));
            }
        }
        self.chosen = best.map(|(column, _)| column);
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let column = self.chosen.ok_or_else(|| {
            EnsembleError::ModelError("Best-in-sample selector used before fit".to_string())
        })?;
        row.get(column).copied().ok_or_else(|| {
            EnsembleError::ModelError(format!(
                "Row of width {} missing selected column {}",
                row.len(),
                column
            ))
        })
    }

    fn boxed_clone(&self) -> Box<dyn Predictor> {
        Box::new(self.clone())
    }
}

/// Equal-weight blend of all base-model predictions.
#[derive(Debug, Clone, Default)]
pub struct BlendedMean;

impl Predictor for BlendedMean {
    fn fit(&mut self, rows: &[Vec<f64>], _targets: &[f64], _params: &ParamSet) -> Result<()> {
        if rows.first().map_or(true, |r| r.is_empty()) {
            return Err(EnsembleError::ModelError(
                "Empty training window".to_string(),
            ));
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.is_empty() {
            return Err(EnsembleError::ModelError(
                "No base-model columns to blend".to_string(),
            ));
        }
        Ok(row.iter().sum::<f64>() / row.len() as f64)
    }

    fn boxed_clone(&self) -> Box<dyn Predictor> {
        Box::new(self.clone())
    }
}

/// Best-in-sample selector scored with the run's natural metric.
pub fn best_in_sample(run_config: &RunConfig) -> Result<ModelAdapter> {
    let scoring = match run_config.output_type {
        OutputType::Classification => Scoring::Accuracy,
        OutputType::Regression => Scoring::NegMeanSquaredError,
    };
    Ok(ModelAdapter::new(
        "best_in_sample",
        Box::new(BestInSample::new(scoring)),
        HyperGrid::new(),
        run_config,
    ))
}

/// Equal-weight blend of the base models.
pub fn blended_mean(run_config: &RunConfig) -> Result<ModelAdapter> {
    Ok(ModelAdapter::new(
        "blended_mean",
        Box::new(BlendedMean),
        HyperGrid::new(),
        run_config,
    ))
}
