//! Hyperparameter calibration: typed grids, exhaustive search, genetic search
//!
//! Both strategies look identical from the caller's side: hand
//! [`Calibrator::run`] a closure that scores one candidate (cross-validation
//! averaged, higher is better) and get back the winning parameter set with
//! its score. Candidate evaluation may fan out on a rayon pool; results are
//! merged in candidate order so parallel and sequential runs always pick the
//! same winner.

mod genetic;

use crate::config::{CalibrationConfig, CalibrationStrategy};
use crate::error::{EnsembleError, Result};
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::warn;

/// One hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; integers coerce.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Candidate values for one hyperparameter: an enumerated set or a
/// continuous numeric range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GridDimension {
    Values(Vec<ParamValue>),
    Span { min: f64, max: f64, steps: usize },
}

impl GridDimension {
    /// Discrete candidates for exhaustive search. A span resolves to
    /// equally spaced points.
    fn grid_points(&self) -> Vec<ParamValue> {
        match self {
            GridDimension::Values(values) => values.clone(),
            GridDimension::Span { min, max, steps } => {
                let steps = (*steps).max(1);
                if steps == 1 || max <= min {
                    return vec![ParamValue::Float(*min)];
                }
                (0..steps)
                    .map(|i| {
                        ParamValue::Float(min + (max - min) * i as f64 / (steps - 1) as f64)
                    })
                    .collect()
            }
        }
    }

    /// Numeric bounds, when the dimension is numeric at all.
    fn numeric_range(&self) -> Option<(f64, f64)> {
        match self {
            GridDimension::Span { min, max, .. } => Some((*min, *max)),
            GridDimension::Values(values) => {
                let floats: Vec<f64> = values.iter().filter_map(|v| v.as_float()).collect();
                if floats.len() != values.len() || floats.is_empty() {
                    return None;
                }
                let min = floats.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = floats.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                Some((min, max))
            }
        }
    }

    /// One uniformly drawn value.
    fn sample_value(&self, rng: &mut StdRng) -> ParamValue {
        match self {
            GridDimension::Values(values) => values[rng.gen_range(0..values.len())].clone(),
            GridDimension::Span { min, max, .. } => {
                if max <= min {
                    ParamValue::Float(*min)
                } else {
                    ParamValue::Float(rng.gen_range(*min..=*max))
                }
            }
        }
    }

    /// Nearest discrete candidate to `target`; spans stay continuous.
    fn snap(&self, target: f64) -> ParamValue {
        match self {
            GridDimension::Span { min, max, .. } => ParamValue::Float(target.clamp(*min, *max)),
            GridDimension::Values(values) => values
                .iter()
                .filter(|v| v.as_float().is_some())
                .min_by(|a, b| {
                    let da = (a.as_float().unwrap_or(f64::INFINITY) - target).abs();
                    let db = (b.as_float().unwrap_or(f64::INFINITY) - target).abs();
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .cloned()
                .unwrap_or(ParamValue::Float(target)),
        }
    }
}

/// Ordered mapping from hyperparameter name to its candidate values.
/// Immutable once handed to a model adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperGrid {
    dims: Vec<(String, GridDimension)>,
}

impl HyperGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.dims
            .push((name.to_string(), GridDimension::Values(values)));
        self
    }

    pub fn with_span(mut self, name: &str, min: f64, max: f64, steps: usize) -> Self {
        self.dims
            .push((name.to_string(), GridDimension::Span { min, max, steps }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn dims(&self) -> &[(String, GridDimension)] {
        &self.dims
    }

    /// Size of the cartesian product (1 for an empty grid: the single
    /// all-defaults candidate).
    pub fn combinations(&self) -> usize {
        self.dims
            .iter()
            .map(|(_, dim)| dim.grid_points().len().max(1))
            .product()
    }

    /// Every combination of grid points, in declaration order with the last
    /// dimension varying fastest.
    pub fn cartesian(&self) -> Vec<ParamSet> {
        let mut combos = vec![ParamSet::default()];
        for (name, dim) in &self.dims {
            let points = dim.grid_points();
            if points.is_empty() {
                continue;
            }
            let mut expanded = Vec::with_capacity(combos.len() * points.len());
            for combo in &combos {
                for point in &points {
                    let mut next = combo.clone();
                    next.insert(name, point.clone());
                    expanded.push(next);
                }
            }
            combos = expanded;
        }
        combos
    }

    /// One uniformly sampled gene vector, aligned with `dims()` order.
    fn sample_genes(&self, rng: &mut StdRng) -> Vec<ParamValue> {
        self.dims
            .iter()
            .map(|(_, dim)| dim.sample_value(rng))
            .collect()
    }

    fn genes_to_params(&self, genes: &[ParamValue]) -> ParamSet {
        let mut params = ParamSet::default();
        for ((name, _), value) in self.dims.iter().zip(genes.iter()) {
            params.insert(name, value.clone());
        }
        params
    }
}

/// A chosen hyperparameter assignment, ordered by grid declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParamSet {
    pub fn insert(&mut self, name: &str, value: ParamValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_float)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_text)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.entries {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        Ok(())
    }
}

/// The winning configuration of one calibration, kept on the model for
/// inspection and reproducibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    pub params: ParamSet,
    /// Cross-validated score of the winner; `None` when the grid offered no
    /// choice and nothing was scored
    pub score: Option<f64>,
}

/// Entry point shared by both calibration strategies.
pub struct Calibrator<'a> {
    grid: &'a HyperGrid,
    config: &'a CalibrationConfig,
}

impl<'a> Calibrator<'a> {
    pub fn new(grid: &'a HyperGrid, config: &'a CalibrationConfig) -> Self {
        Self { grid, config }
    }

    /// Run the configured search. `evaluate` scores one candidate; higher is
    /// better. Deterministic for a fixed `seed` regardless of `parallel`.
    pub fn run<F>(&self, seed: u64, evaluate: F) -> Result<CalibrationOutcome>
    where
        F: Fn(&ParamSet) -> Result<f64> + Sync,
    {
        if self.grid.combinations() <= 1 {
            // Nothing to choose between; the fixed assignment wins unscored.
            let params = self.grid.cartesian().into_iter().next().unwrap_or_default();
            return Ok(CalibrationOutcome {
                params,
                score: None,
            });
        }
        if self.config.scoring.is_none() {
            return Err(EnsembleError::MissingScoringFunction);
        }

        match self.config.strategy {
            CalibrationStrategy::GridSearch => self.exhaustive(evaluate),
            CalibrationStrategy::GeneticAlgorithm => {
                genetic::search(self.grid, self.config, seed, evaluate)
            }
        }
    }

    fn exhaustive<F>(&self, evaluate: F) -> Result<CalibrationOutcome>
    where
        F: Fn(&ParamSet) -> Result<f64> + Sync,
    {
        let candidates = self.grid.cartesian();
        let deadline = self.config.time_budget.map(|budget| Instant::now() + budget);

        let scores: Vec<f64> = if self.config.parallel && deadline.is_none() {
            candidates
                .par_iter()
                .map(|params| evaluate(params))
                .collect::<Result<Vec<_>>>()?
        } else {
            let mut scores = Vec::with_capacity(candidates.len());
            for params in &candidates {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline && !scores.is_empty() {
                        warn!(
                            evaluated = scores.len(),
                            total = candidates.len(),
                            "calibration budget expired; keeping best candidate so far"
                        );
                        break;
                    }
                }
                scores.push(evaluate(params)?);
            }
            scores
        };

        // Strict improvement only, so ties keep the first-seen candidate.
        let mut best: Option<(usize, f64)> = None;
        for (i, &score) in scores.iter().enumerate() {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        let (index, score) = best.ok_or_else(|| {
            EnsembleError::InvalidConfiguration("Grid produced no candidates".to_string())
        })?;
        Ok(CalibrationOutcome {
            params: candidates[index].clone(),
            score: Some(score),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> HyperGrid {
        HyperGrid::new()
            .with_values(
                "window_size",
                vec![ParamValue::Int(2), ParamValue::Int(4), ParamValue::Int(8)],
            )
            .with_span("alpha", 0.0, 1.0, 3)
    }

    #[test]
    fn cartesian_covers_every_combination_in_order() {
        let combos = grid().cartesian();
        assert_eq!(combos.len(), 9);
        assert_eq!(combos[0].get_int("window_size"), Some(2));
        assert_eq!(combos[0].get_float("alpha"), Some(0.0));
        // last dimension varies fastest
        assert_eq!(combos[1].get_int("window_size"), Some(2));
        assert_eq!(combos[1].get_float("alpha"), Some(0.5));
        assert_eq!(combos[8].get_int("window_size"), Some(8));
        assert_eq!(combos[8].get_float("alpha"), Some(1.0));
    }

    #[test]
    fn empty_grid_yields_the_single_default_candidate() {
        let grid = HyperGrid::new();
        assert_eq!(grid.combinations(), 1);
        let combos = grid.cartesian();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn snap_picks_the_nearest_discrete_value() {
        let dim = GridDimension::Values(vec![
            ParamValue::Int(1),
            ParamValue::Int(10),
            ParamValue::Int(50),
        ]);
        assert_eq!(dim.snap(12.0), ParamValue::Int(10));
        assert_eq!(dim.snap(40.0), ParamValue::Int(50));
    }
}
