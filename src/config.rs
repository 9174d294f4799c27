//! Run-wide and calibration configuration
//!
//! Both configs are immutable value objects passed by reference into the
//! driver and into each model constructor; there is no process-global state.

use crate::error::{EnsembleError, Result};
use crate::metrics::Scoring;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the target series holds: discrete class labels or continuous returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    Classification,
    Regression,
}

/// What the walk-forward driver does when a single step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPolicy {
    /// Abort this model's pass (sibling models are unaffected)
    AbortModel,
    /// Record a missing prediction for the step and keep walking
    SkipStep,
}

/// Process-wide settings, fixed for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of trailing observations in every training window
    pub rolling_window_size: usize,
    pub output_type: OutputType,
    /// Absolute return level separating the zero class from the signed ones.
    /// Zero collapses the label set to binary.
    pub threshold: f64,
    pub step_policy: StepPolicy,
    /// Window size for the second-stage pass; defaults to `rolling_window_size`
    pub core_window_size: Option<usize>,
}

impl RunConfig {
    pub fn new(rolling_window_size: usize, output_type: OutputType, threshold: f64) -> Self {
        Self {
            rolling_window_size,
            output_type,
            threshold,
            step_policy: StepPolicy::AbortModel,
            core_window_size: None,
        }
    }

    pub fn with_step_policy(mut self, policy: StepPolicy) -> Self {
        self.step_policy = policy;
        self
    }

    pub fn with_core_window_size(mut self, size: usize) -> Self {
        self.core_window_size = Some(size);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rolling_window_size == 0 {
            return Err(EnsembleError::InvalidConfiguration(
                "rolling_window_size must be positive".to_string(),
            ));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(EnsembleError::InvalidConfiguration(
                "threshold must be a non-negative finite number".to_string(),
            ));
        }
        if self.core_window_size == Some(0) {
            return Err(EnsembleError::InvalidConfiguration(
                "core_window_size must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// The class label set implied by the configured threshold.
    pub fn classes(&self) -> Vec<f64> {
        if self.threshold > 0.0 {
            vec![-1.0, 0.0, 1.0]
        } else {
            vec![-1.0, 1.0]
        }
    }
}

/// Which search walks the hyperparameter grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationStrategy {
    GridSearch,
    GeneticAlgorithm,
}

/// Settings for one hyperparameter calibration, shared by every step of a
/// walk-forward pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub strategy: CalibrationStrategy,
    /// Number of time-ordered cross-validation folds per candidate
    pub n_splits: usize,
    /// Scoring function used to rank candidates; required whenever the grid
    /// offers more than one candidate
    pub scoring: Option<Scoring>,
    /// Genetic search: number of generations
    pub n_iter: usize,
    /// Genetic search: population size
    pub init_pop_size: usize,
    /// Genetic search: fraction of the population retained as parents
    pub select_rate: f64,
    /// Genetic search: blend weight applied to the first parent in crossover
    pub mixing_ratio: f64,
    /// Genetic search: per-parameter mutation probability
    pub mutation_proba: f64,
    /// Genetic search: mutation sigma as a fraction of the parameter's range
    pub variance_ratio: f64,
    /// Genetic search: stop after this many generations without improvement
    pub stagnation_limit: Option<usize>,
    /// Base seed for all stochastic search; each step derives its own stream
    pub seed: u64,
    /// Wall-clock budget per calibration; on expiry the best candidate found
    /// so far wins instead of the step failing
    pub time_budget: Option<Duration>,
    /// Evaluate candidates on a rayon pool instead of sequentially
    pub parallel: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            strategy: CalibrationStrategy::GridSearch,
            n_splits: 5,
            scoring: None,
            n_iter: 25,
            init_pop_size: 10,
            select_rate: 0.5,
            mixing_ratio: 0.5,
            mutation_proba: 0.1,
            variance_ratio: 0.1,
            stagnation_limit: None,
            seed: 0,
            time_budget: None,
            parallel: false,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_splits == 0 {
            return Err(EnsembleError::InvalidConfiguration(
                "n_splits must be positive".to_string(),
            ));
        }
        if self.n_iter == 0 {
            return Err(EnsembleError::InvalidConfiguration(
                "n_iter must be positive".to_string(),
            ));
        }
        if self.init_pop_size < 2 {
            return Err(EnsembleError::InvalidConfiguration(
                "init_pop_size must be at least 2".to_string(),
            ));
        }
        if !(self.select_rate > 0.0 && self.select_rate <= 1.0) {
            return Err(EnsembleError::InvalidConfiguration(
                "select_rate must be in (0, 1]".to_string(),
            ));
        }
        for (name, value) in [
            ("mixing_ratio", self.mixing_ratio),
            ("mutation_proba", self.mutation_proba),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EnsembleError::InvalidConfiguration(format!(
                    "{} must be in [0, 1]",
                    name
                )));
            }
        }
        if !(self.variance_ratio > 0.0) {
            return Err(EnsembleError::InvalidConfiguration(
                "variance_ratio must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
