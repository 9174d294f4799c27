//! Model adapters: the uniform contract every base and core model satisfies
//!
//! Concrete estimators only implement the [`Predictor`] seam (column
//! selection, fit, one-row inference). Everything the walk-forward driver
//! needs on top of that lives on [`ModelAdapter`] and is identical across
//! variants: calibration, leakage checks, prediction records and summary
//! outputs.

pub mod ensemble_core;
pub mod historical_mean;
pub mod linear;
pub mod tree;

use crate::calibration::{CalibrationOutcome, Calibrator, HyperGrid, ParamSet};
use crate::config::{CalibrationConfig, OutputType, RunConfig};
use crate::data::{FeatureMatrix, TimeSeries};
use crate::error::{EnsembleError, Result};
use crate::metrics::{self, Scoring};
use crate::validation::time_series_split;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One out-of-sample prediction. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub model_name: String,
    pub value: f64,
    /// Hyperparameters chosen by the calibration that produced this step
    pub params: ParamSet,
}

/// Summary metrics computed once a walk-forward pass has finished.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelOutputs {
    pub accuracy: Option<f64>,
    pub mse: Option<f64>,
    pub mae: Option<f64>,
    pub predictions: usize,
}

/// The model-math seam. Implementations are opaque to the harness: the
/// driver and calibrator only ever fit on window rows and ask for one
/// prediction per row.
pub trait Predictor: Send + Sync {
    /// Columns of the feature matrix this model consumes. Defaults to all.
    fn select_columns(&self, columns: &[String]) -> Vec<usize> {
        (0..columns.len()).collect()
    }

    /// Fit on the given training rows with the given hyperparameters.
    fn fit(&mut self, rows: &[Vec<f64>], targets: &[f64], params: &ParamSet) -> Result<()>;

    /// Predict the target for a single feature row using the fitted state.
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    fn boxed_clone(&self) -> Box<dyn Predictor>;
}

/// Uniform wrapper around one predictor: owns its hyperparameter grid, its
/// chosen calibration outcome, its prediction records and its outputs. The
/// walk-forward driver only ever talks to this type.
pub struct ModelAdapter {
    name: String,
    predictor: Box<dyn Predictor>,
    grid: HyperGrid,
    run_config: RunConfig,
    selection: Option<Vec<usize>>,
    best: Option<CalibrationOutcome>,
    records: Vec<PredictionRecord>,
    outputs: Option<ModelOutputs>,
}

impl ModelAdapter {
    pub fn new(
        name: &str,
        predictor: Box<dyn Predictor>,
        grid: HyperGrid,
        run_config: &RunConfig,
    ) -> Self {
        Self {
            name: name.to_string(),
            predictor,
            grid,
            run_config: run_config.clone(),
            selection: None,
            best: None,
            records: Vec::new(),
            outputs: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &HyperGrid {
        &self.grid
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    /// Accumulated records serialized for external inspection.
    pub fn records_json(&self) -> Result<String> {
        serde_json::to_string(&self.records)
            .map_err(|err| EnsembleError::DataError(format!("Serializing records: {}", err)))
    }

    /// Winning hyperparameters of the most recent calibration.
    pub fn best_calibration(&self) -> Option<&CalibrationOutcome> {
        self.best.as_ref()
    }

    pub fn outputs(&self) -> Option<&ModelOutputs> {
        self.outputs.as_ref()
    }

    /// One-time declaration of the feature columns this model consumes.
    /// Pure with respect to `x`.
    pub fn select_data(&mut self, x: &FeatureMatrix) {
        self.selection = Some(self.predictor.select_columns(x.columns()));
    }

    /// Calibrate hyperparameters against the training window and fit on the
    /// full window with the winner. The window must lie strictly before
    /// `target`; anything else is a leakage bug, not a recoverable state.
    pub fn calibrate(
        &mut self,
        x_train: &FeatureMatrix,
        y_train: &[f64],
        target: DateTime<Utc>,
        calib: &CalibrationConfig,
    ) -> Result<()> {
        if let Some(last) = x_train.timestamps().last() {
            if *last >= target {
                return Err(EnsembleError::LeakageRisk(format!(
                    "Training window reaches {} for prediction target {}",
                    last, target
                )));
            }
        }
        if x_train.len() != y_train.len() {
            return Err(EnsembleError::DataError(format!(
                "Training rows ({}) don't match targets ({})",
                x_train.len(),
                y_train.len()
            )));
        }
        let selection = self
            .selection
            .clone()
            .ok_or_else(|| missing_selection("calibrate"))?;
        let selected = x_train.select_columns(&selection)?;
        let folds = time_series_split(selected.len(), calib.n_splits)?;
        let rows = selected.rows();

        let scoring = calib.scoring;
        let output_type = self.run_config.output_type;
        let classes = self.run_config.classes();
        let predictor = &self.predictor;
        let evaluate = |params: &ParamSet| -> Result<f64> {
            let scoring = scoring.ok_or(EnsembleError::MissingScoringFunction)?;
            let mut total = 0.0;
            for fold in &folds {
                let mut candidate = predictor.boxed_clone();
                candidate.fit(
                    &rows[fold.train.clone()],
                    &y_train[fold.train.clone()],
                    params,
                )?;
                let mut predicted = Vec::with_capacity(fold.validation.len());
                for i in fold.validation.clone() {
                    let raw = candidate.predict_row(&rows[i])?;
                    predicted.push(snap_value(raw, output_type, &classes));
                }
                total += scoring.compute(&predicted, &y_train[fold.validation.clone()])?;
            }
            Ok(total / folds.len() as f64)
        };

        let seed = derive_seed(calib.seed, target);
        let outcome = Calibrator::new(&self.grid, calib).run(seed, evaluate)?;

        self.predictor.fit(rows, y_train, &outcome.params)?;
        self.best = Some(outcome);
        Ok(())
    }

    /// Produce exactly one prediction for `target` from the state fitted by
    /// the most recent `calibrate` call, and record it.
    pub fn predict(&mut self, row: &[f64], target: DateTime<Utc>) -> Result<()> {
        let selection = self
            .selection
            .as_ref()
            .ok_or_else(|| missing_selection("predict"))?;
        if let Some(&bad) = selection.iter().find(|&&c| c >= row.len()) {
            return Err(EnsembleError::DataError(format!(
                "Selected column {} out of bounds for row of width {}",
                bad,
                row.len()
            )));
        }
        let features: Vec<f64> = selection.iter().map(|&c| row[c]).collect();
        let raw = self.predictor.predict_row(&features)?;
        let value = snap_value(raw, self.run_config.output_type, &self.run_config.classes());
        let params = self
            .best
            .as_ref()
            .map(|b| b.params.clone())
            .unwrap_or_default();
        self.records.push(PredictionRecord {
            timestamp: target,
            model_name: self.name.clone(),
            value,
            params,
        });
        Ok(())
    }

    /// Compare the accumulated records against ground truth and store the
    /// resulting summary metrics.
    pub fn compute_outputs(&mut self, y_true: &TimeSeries) -> Result<ModelOutputs> {
        let by_ts: BTreeMap<DateTime<Utc>, f64> = y_true
            .timestamps()
            .iter()
            .copied()
            .zip(y_true.values().iter().copied())
            .collect();

        let mut predicted = Vec::with_capacity(self.records.len());
        let mut actual = Vec::with_capacity(self.records.len());
        for record in &self.records {
            if let Some(truth) = by_ts.get(&record.timestamp) {
                predicted.push(record.value);
                actual.push(*truth);
            }
        }

        let outputs = if predicted.is_empty() {
            ModelOutputs::default()
        } else {
            match self.run_config.output_type {
                OutputType::Classification => ModelOutputs {
                    accuracy: Some(metrics::accuracy(&predicted, &actual)?),
                    mse: None,
                    mae: None,
                    predictions: predicted.len(),
                },
                OutputType::Regression => ModelOutputs {
                    accuracy: None,
                    mse: Some(metrics::mean_squared_error(&predicted, &actual)?),
                    mae: Some(metrics::mean_absolute_error(&predicted, &actual)?),
                    predictions: predicted.len(),
                },
            }
        };
        self.outputs = Some(outputs.clone());
        Ok(outputs)
    }

    /// The model's summary score under the given metric, when available.
    pub fn score(&self, scoring: Scoring) -> Option<f64> {
        let outputs = self.outputs.as_ref()?;
        match scoring {
            Scoring::Accuracy => outputs.accuracy,
            Scoring::NegMeanSquaredError => outputs.mse.map(|v| -v),
            Scoring::NegMeanAbsoluteError => outputs.mae.map(|v| -v),
        }
    }
}

fn missing_selection(method: &str) -> EnsembleError {
    EnsembleError::ModelError(format!("select_data must run before {}", method))
}

fn derive_seed(base: u64, target: DateTime<Utc>) -> u64 {
    base.wrapping_add(target.timestamp() as u64)
}

/// Classification predictions snap to the nearest configured class label;
/// regression predictions pass through.
fn snap_value(raw: f64, output_type: OutputType, classes: &[f64]) -> f64 {
    match output_type {
        OutputType::Regression => raw,
        OutputType::Classification => classes
            .iter()
            .copied()
            .min_by(|a, b| {
                (a - raw)
                    .abs()
                    .partial_cmp(&(b - raw).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(raw),
    }
}

type AdapterBuilder = fn(&RunConfig) -> Result<ModelAdapter>;

/// Maps configuration names to adapter constructors.
pub struct ModelRegistry {
    builders: BTreeMap<String, AdapterBuilder>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// A registry pre-populated with every model variant in the crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("historical_mean", historical_mean::arithmetic);
        registry.register("geometric_mean", historical_mean::geometric);
        registry.register("short_term_mean", historical_mean::short_term);
        registry.register("linear_regression", linear::ordinary);
        registry.register("lasso", linear::lasso);
        registry.register("elastic_net", linear::elastic_net);
        registry.register("decision_tree", tree::decision_tree);
        registry.register("best_in_sample", ensemble_core::best_in_sample);
        registry.register("blended_mean", ensemble_core::blended_mean);
        registry
    }

    pub fn register(&mut self, name: &str, builder: AdapterBuilder) {
        self.builders.insert(name.to_string(), builder);
    }

    pub fn build(&self, name: &str, run_config: &RunConfig) -> Result<ModelAdapter> {
        let builder = self.builders.get(name).ok_or_else(|| {
            EnsembleError::InvalidConfiguration(format!("Unknown model '{}'", name))
        })?;
        builder(run_config)
    }

    pub fn names(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
