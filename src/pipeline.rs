//! Two-stage walk-forward pipeline
//!
//! Stage one runs every base model over the lagged series; stage two joins
//! their predictions into the core dataset and runs the core model over it.
//! A failing base model aborts only its own pass.

use crate::config::{CalibrationConfig, OutputType, RunConfig};
use crate::data::{self, TimeSeries};
use crate::driver::{DriverReport, WalkForwardDriver};
use crate::ensemble;
use crate::error::Result;
use crate::metrics::Scoring;
use crate::models::ModelAdapter;
use tracing::{error, info, warn};

/// Results of one full two-stage run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub base_reports: Vec<DriverReport>,
    /// `None` when no base model produced predictions to ensemble
    pub core_report: Option<DriverReport>,
    pub comparison_warnings: Vec<String>,
}

pub struct EnsemblePipeline {
    run_config: RunConfig,
    calib_config: CalibrationConfig,
    lags: Vec<usize>,
}

impl EnsemblePipeline {
    pub fn new(
        run_config: RunConfig,
        calib_config: CalibrationConfig,
        lags: Vec<usize>,
    ) -> Result<Self> {
        run_config.validate()?;
        calib_config.validate()?;
        Ok(Self {
            run_config,
            calib_config,
            lags,
        })
    }

    /// Run base models and the core model over the raw return series.
    pub fn run(
        &self,
        returns: &TimeSeries,
        base_models: &mut [ModelAdapter],
        core_model: &mut ModelAdapter,
    ) -> Result<PipelineOutcome> {
        // Features are lags of the continuous series; only the target is
        // class-transformed.
        let x = data::lagged(returns, &self.lags)?;
        let y = match self.run_config.output_type {
            OutputType::Classification => data::to_class(returns, self.run_config.threshold)?,
            OutputType::Regression => returns.clone(),
        };
        let y_aligned = y.restrict_to(x.timestamps())?;

        let driver = WalkForwardDriver::new(self.run_config.rolling_window_size)?;
        let mut base_reports = Vec::with_capacity(base_models.len());
        for adapter in base_models.iter_mut() {
            info!(model = adapter.name(), "running walk-forward pass");
            match driver.run(adapter, &x, &y_aligned, &self.calib_config, &self.run_config) {
                Ok(report) => base_reports.push(report),
                Err(err) => {
                    // configuration or model failures stay local to this model
                    error!(model = adapter.name(), error = %err, "model pass aborted");
                }
            }
        }

        let contributors: Vec<&ModelAdapter> = base_models
            .iter()
            .filter(|adapter| !adapter.records().is_empty())
            .collect();
        if contributors.is_empty() {
            warn!("no base model produced predictions; skipping the core pass");
            return Ok(PipelineOutcome {
                base_reports,
                core_report: None,
                comparison_warnings: Vec::new(),
            });
        }

        let x_core = ensemble::core_dataset(&contributors)?;
        let y_core = y.restrict_to(x_core.timestamps())?;
        let core_window = self
            .run_config
            .core_window_size
            .unwrap_or(self.run_config.rolling_window_size);
        let core_driver = WalkForwardDriver::new(core_window)?;
        info!(model = core_model.name(), "running core walk-forward pass");
        let core_report = core_driver.run(
            core_model,
            &x_core,
            &y_core,
            &self.calib_config,
            &self.run_config,
        )?;

        let scoring = self.calib_config.scoring.unwrap_or(match self.run_config.output_type {
            OutputType::Classification => Scoring::Accuracy,
            OutputType::Regression => Scoring::NegMeanSquaredError,
        });
        let comparison_warnings = ensemble::compare_with_base(core_model, &contributors, scoring);

        Ok(PipelineOutcome {
            base_reports,
            core_report: Some(core_report),
            comparison_warnings,
        })
    }
}
