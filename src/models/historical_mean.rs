//! Rolling historical-mean predictors
//!
//! The feature rows of the first stage are lags of the target itself, so a
//! historical mean is just an average over the first `window_size` lag
//! columns of the row being predicted.

use super::{ModelAdapter, Predictor};
use crate::calibration::{HyperGrid, ParamSet, ParamValue};
use crate::config::RunConfig;
use crate::error::{EnsembleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeanKind {
    Arithmetic,
    /// Compound-growth mean over return lags
    Geometric,
}

#[derive(Debug, Clone)]
pub struct HistoricalMean {
    kind: MeanKind,
    /// Lags averaged when no `window_size` hyperparameter is supplied;
    /// `None` means every available lag column
    default_window: Option<usize>,
    window_size: usize,
}

impl HistoricalMean {
    pub fn new(kind: MeanKind, default_window: Option<usize>) -> Result<Self> {
        if default_window == Some(0) {
            return Err(EnsembleError::InvalidConfiguration(
                "Mean window must be positive".to_string(),
            ));
        }
        Ok(Self {
            kind,
            default_window,
            window_size: 0,
        })
    }
}

impl Predictor for HistoricalMean {
    fn fit(&mut self, rows: &[Vec<f64>], _targets: &[f64], params: &ParamSet) -> Result<()> {
        let width = rows
            .first()
            .map(|r| r.len())
            .ok_or_else(|| EnsembleError::ModelError("Empty training window".to_string()))?;

        let window = match params.get_int("window_size") {
            Some(v) if v >= 1 => v as usize,
            Some(v) => {
                return Err(EnsembleError::InvalidConfiguration(format!(
                    "window_size must be positive, got {}",
                    v
                )))
            }
            None => self.default_window.unwrap_or(width),
        };
        if window > width {
            return Err(EnsembleError::InvalidConfiguration(format!(
                "window_size {} exceeds the {} available lag columns",
                window, width
            )));
        }
        self.window_size = window;
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if self.window_size == 0 {
            return Err(EnsembleError::ModelError(
                "Historical mean used before fit".to_string(),
            ));
        }
        if row.len() < self.window_size {
            return Err(EnsembleError::ModelError(format!(
                "Row of width {} too narrow for mean window {}",
                row.len(),
                self.window_size
            )));
        }
        let lags = &row[..self.window_size];
        let n = lags.len() as f64;
        match self.kind {
            MeanKind::Arithmetic => Ok(lags.iter().sum::<f64>() / n),
            MeanKind::Geometric => {
                let mut log_sum = 0.0;
                for &r in lags {
                    let factor = 1.0 + r;
                    if factor <= 0.0 {
                        return Err(EnsembleError::ModelError(format!(
                            "Geometric mean undefined for growth factor {}",
                            factor
                        )));
                    }
                    log_sum += factor.ln();
                }
                Ok((log_sum / n).exp() - 1.0)
            }
        }
    }

    fn boxed_clone(&self) -> Box<dyn Predictor> {
        Box::new(self.clone())
    }
}

/// Arithmetic mean over every available lag.
pub fn arithmetic(run_config: &RunConfig) -> Result<ModelAdapter> {
    let predictor = HistoricalMean::new(MeanKind::Arithmetic, None)?;
    Ok(ModelAdapter::new(
        "historical_mean",
        Box::new(predictor),
        HyperGrid::new(),
        run_config,
    ))
}

/// Geometric mean with a calibrated lag window.
pub fn geometric(run_config: &RunConfig) -> Result<ModelAdapter> {
    let predictor = HistoricalMean::new(MeanKind::Geometric, None)?;
    let grid = HyperGrid::new().with_values(
        "window_size",
        vec![
            ParamValue::Int(1),
            ParamValue::Int(10),
            ParamValue::Int(50),
            ParamValue::Int(100),
        ],
    );
    Ok(ModelAdapter::new(
        "geometric_mean",
        Box::new(predictor),
        grid,
        run_config,
    ))
}

/// Arithmetic mean over a fixed short lag window.
pub fn short_term(run_config: &RunConfig) -> Result<ModelAdapter> {
    let predictor = HistoricalMean::new(MeanKind::Arithmetic, Some(10))?;
    Ok(ModelAdapter::new(
        "short_term_mean",
        Box::new(predictor),
        HyperGrid::new(),
        run_config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_mean_averages_the_window() {
        let mut model = HistoricalMean::new(MeanKind::Arithmetic, Some(3)).unwrap();
        let rows = vec![vec![0.0; 5]];
        model.fit(&rows, &[0.0], &ParamSet::default()).unwrap();
        let prediction = model.predict_row(&[3.0, 6.0, 9.0, 100.0, 100.0]).unwrap();
        assert!((prediction - 6.0).abs() < 1e-12);
    }

    #[test]
    fn geometric_mean_compounds_growth() {
        let mut model = HistoricalMean::new(MeanKind::Geometric, Some(2)).unwrap();
        let rows = vec![vec![0.0; 2]];
        model.fit(&rows, &[0.0], &ParamSet::default()).unwrap();
        // factors 1.1 and 0.9 compound to sqrt(0.99)
        let prediction = model.predict_row(&[0.1, -0.1]).unwrap();
        assert!((prediction - (0.99f64.sqrt() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn geometric_mean_rejects_total_loss() {
        let mut model = HistoricalMean::new(MeanKind::Geometric, Some(2)).unwrap();
        let rows = vec![vec![0.0; 2]];
        model.fit(&rows, &[0.0], &ParamSet::default()).unwrap();
        assert!(model.predict_row(&[-1.0, 0.1]).is_err());
    }

    #[test]
    fn window_size_hyperparameter_overrides_the_default() {
        let mut model = HistoricalMean::new(MeanKind::Arithmetic, None).unwrap();
        let mut params = ParamSet::default();
        params.insert("window_size", ParamValue::Int(2));
        let rows = vec![vec![0.0; 4]];
        model.fit(&rows, &[0.0], &params).unwrap();
        let prediction = model.predict_row(&[1.0, 3.0, 100.0, 100.0]).unwrap();
        assert!((prediction - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_windows_wider_than_the_features() {
        let mut model = HistoricalMean::new(MeanKind::Arithmetic, Some(10)).unwrap();
        let rows = vec![vec![0.0; 3]];
        assert!(model.fit(&rows, &[0.0], &ParamSet::default()).is_err());
    }
}
