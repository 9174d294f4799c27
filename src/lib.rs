//! # Ensemble Forecast
//!
//! A Rust library for rolling-window walk-forward forecasting and model
//! ensembling over a single financial time series.
//!
//! ## Features
//!
//! - Timestamp-aligned series and lag-matrix construction
//! - Walk-forward evaluation with strict leakage prevention
//! - Hyperparameter calibration by exhaustive grid search or a seeded
//!   genetic algorithm, scored with time-ordered cross-validation
//! - Base models (historical mean, regression family, decision tree) behind
//!   one adapter contract
//! - A second-stage "core" model trained on the base models' predictions
//!
//! ## Quick Start
//!
//! ```no_run
//! use ensemble_forecast::config::{CalibrationConfig, OutputType, RunConfig};
//! use ensemble_forecast::data::DataLoader;
//! use ensemble_forecast::metrics::Scoring;
//! use ensemble_forecast::models::ModelRegistry;
//! use ensemble_forecast::pipeline::EnsemblePipeline;
//!
//! # fn main() -> ensemble_forecast::error::Result<()> {
//! let returns = DataLoader::from_csv("returns.csv")?;
//!
//! let run_config = RunConfig::new(500, OutputType::Classification, 0.001);
//! let mut calib_config = CalibrationConfig::default();
//! calib_config.scoring = Some(Scoring::Accuracy);
//!
//! let registry = ModelRegistry::with_defaults();
//! let mut base_models = vec![
//!     registry.build("historical_mean", &run_config)?,
//!     registry.build("elastic_net", &run_config)?,
//!     registry.build("decision_tree", &run_config)?,
//! ];
//! let mut core_model = registry.build("best_in_sample", &run_config)?;
//!
//! let lags: Vec<usize> = (1..=5).collect();
//! let pipeline = EnsemblePipeline::new(run_config, calib_config, lags)?;
//! let outcome = pipeline.run(&returns, &mut base_models, &mut core_model)?;
//!
//! for report in &outcome.base_reports {
//!     println!("{}: {} predictions", report.model, report.steps_run);
//! }
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod config;
pub mod data;
pub mod driver;
pub mod ensemble;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod validation;
pub mod window;

// Re-export commonly used types
pub use crate::config::{CalibrationConfig, OutputType, RunConfig};
pub use crate::data::{DataLoader, FeatureMatrix, TimeSeries};
pub use crate::driver::{DriverReport, WalkForwardDriver};
pub use crate::error::EnsembleError;
pub use crate::models::{ModelAdapter, ModelRegistry, Predictor};
pub use crate::pipeline::{EnsemblePipeline, PipelineOutcome};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
