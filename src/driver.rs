//! Walk-forward evaluation driver
//!
//! One pass per model: select columns once, then for each target index slice
//! the trailing window, calibrate, predict, and finally compute summary
//! outputs. The driver owns all index bookkeeping; it never touches model
//! state except through the adapter contract.

use crate::config::{CalibrationConfig, RunConfig, StepPolicy};
use crate::data::{FeatureMatrix, TimeSeries};
use crate::error::{EnsembleError, Result};
use crate::models::ModelAdapter;
use crate::window::RollingWindow;
use serde::Serialize;
use tracing::{debug, warn};

/// What one walk-forward pass did.
#[derive(Debug, Clone, Serialize)]
pub struct DriverReport {
    pub model: String,
    pub steps_run: usize,
    /// Steps that failed and were recorded as missing under `SkipStep`
    pub steps_skipped: usize,
    /// True when the history was too short for even one window
    pub empty_history: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct WalkForwardDriver {
    window_size: usize,
}

impl WalkForwardDriver {
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(EnsembleError::InvalidConfiguration(
                "Window size must be positive".to_string(),
            ));
        }
        Ok(Self { window_size })
    }

    /// Run one model over the aligned (features, target) pair. Targets are
    /// visited in strictly increasing order; each step trains only on the
    /// trailing window that precedes it.
    pub fn run(
        &self,
        adapter: &mut ModelAdapter,
        x: &FeatureMatrix,
        y: &TimeSeries,
        calib: &CalibrationConfig,
        run_config: &RunConfig,
    ) -> Result<DriverReport> {
        run_config.validate()?;
        calib.validate()?;
        if x.timestamps() != y.timestamps() {
            return Err(EnsembleError::InvalidConfiguration(
                "Feature matrix and target series must share one timestamp index".to_string(),
            ));
        }

        adapter.select_data(x);

        if x.len() <= self.window_size {
            warn!(
                model = adapter.name(),
                rows = x.len(),
                window = self.window_size,
                "history shorter than one rolling window; no predictions produced"
            );
            return Ok(DriverReport {
                model: adapter.name().to_string(),
                steps_run: 0,
                steps_skipped: 0,
                empty_history: true,
            });
        }

        let total = x.len() - self.window_size;
        let mut steps_run = 0;
        let mut steps_skipped = 0;
        for target in self.window_size..x.len() {
            let window = RollingWindow::trailing(target, self.window_size)?;
            let timestamp = x.timestamps()[target];

            let step = x.slice(window.range()).and_then(|x_win| {
                let y_win = &y.values()[window.range()];
                adapter.calibrate(&x_win, y_win, timestamp, calib)?;
                adapter.predict(x.row(target), timestamp)
            });

            match step {
                Ok(()) => {
                    steps_run += 1;
                    debug!(
                        model = adapter.name(),
                        step = target - self.window_size + 1,
                        total,
                        "rolling window step"
                    );
                }
                Err(err) => match run_config.step_policy {
                    StepPolicy::AbortModel => return Err(err),
                    StepPolicy::SkipStep => {
                        warn!(
                            model = adapter.name(),
                            %timestamp,
                            error = %err,
                            "step failed; recording missing prediction"
                        );
                        steps_skipped += 1;
                    }
                },
            }
        }

        adapter.compute_outputs(y)?;
        Ok(DriverReport {
            model: adapter.name().to_string(),
            steps_run,
            steps_skipped,
            empty_history: false,
        })
    }
}
