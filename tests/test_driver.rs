use chrono::{DateTime, Duration, TimeZone, Utc};
use ensemble_forecast::calibration::{HyperGrid, ParamSet};
use ensemble_forecast::config::{CalibrationConfig, OutputType, RunConfig, StepPolicy};
use ensemble_forecast::data::{FeatureMatrix, TimeSeries};
use ensemble_forecast::driver::WalkForwardDriver;
use ensemble_forecast::error::{EnsembleError, Result};
use ensemble_forecast::models::{ModelAdapter, Predictor};
use std::sync::{Arc, Mutex};

fn timestamps(n: usize) -> Vec<DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
}

fn single_column_data(values: &[f64]) -> (FeatureMatrix, TimeSeries) {
    let index = timestamps(values.len());
    let rows = values.iter().map(|&v| vec![v]).collect();
    let x = FeatureMatrix::new(index.clone(), vec!["lag_1".to_string()], rows).unwrap();
    let y = TimeSeries::new(index, values.to_vec()).unwrap();
    (x, y)
}

/// Records the length of every training window it is fitted on.
#[derive(Clone, Default)]
struct WindowProbe {
    fit_lengths: Arc<Mutex<Vec<usize>>>,
}

impl Predictor for WindowProbe {
    fn fit(&mut self, rows: &[Vec<f64>], _targets: &[f64], _params: &ParamSet) -> Result<()> {
        self.fit_lengths.lock().unwrap().push(rows.len());
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        Ok(row.iter().sum::<f64>() / row.len().max(1) as f64)
    }

    fn boxed_clone(&self) -> Box<dyn Predictor> {
        Box::new(self.clone())
    }
}

/// Fails every `every`-th fit.
#[derive(Clone)]
struct Flaky {
    calls: Arc<Mutex<usize>>,
    every: usize,
}

impl Predictor for Flaky {
    fn fit(&mut self, _rows: &[Vec<f64>], _targets: &[f64], _params: &ParamSet) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls % self.every == 0 {
            return Err(EnsembleError::ModelError("numerical blow-up".to_string()));
        }
        Ok(())
    }

    fn predict_row(&self, _row: &[f64]) -> Result<f64> {
        Ok(0.0)
    }

    fn boxed_clone(&self) -> Box<dyn Predictor> {
        Box::new(self.clone())
    }
}

fn classification_config(window: usize) -> RunConfig {
    RunConfig::new(window, OutputType::Classification, 0.0)
}

#[test]
fn every_training_window_has_exactly_the_configured_size() {
    let values: Vec<f64> = (0..30).map(|i| (i as f64 * 0.37).sin()).collect();
    let (x, y) = single_column_data(&values);

    let probe = WindowProbe::default();
    let fit_lengths = probe.fit_lengths.clone();
    let run_config = classification_config(10);
    let mut adapter = ModelAdapter::new("probe", Box::new(probe), HyperGrid::new(), &run_config);

    let report = WalkForwardDriver::new(10)
        .unwrap()
        .run(
            &mut adapter,
            &x,
            &y,
            &CalibrationConfig::default(),
            &run_config,
        )
        .unwrap();

    assert_eq!(report.steps_run, 20);
    assert!(!report.empty_history);
    // the empty grid skips candidate evaluation, so each step fits exactly
    // once on the full window
    let lengths = fit_lengths.lock().unwrap();
    assert_eq!(lengths.len(), 20);
    assert!(lengths.iter().all(|&len| len == 10));
}

#[test]
fn predictions_land_on_strictly_increasing_future_timestamps() {
    let values: Vec<f64> = (0..25).map(|i| (i as f64 * 0.71).cos()).collect();
    let (x, y) = single_column_data(&values);

    let run_config = classification_config(8);
    let mut adapter = ModelAdapter::new(
        "probe",
        Box::new(WindowProbe::default()),
        HyperGrid::new(),
        &run_config,
    );

    WalkForwardDriver::new(8)
        .unwrap()
        .run(
            &mut adapter,
            &x,
            &y,
            &CalibrationConfig::default(),
            &run_config,
        )
        .unwrap();

    let recorded: Vec<_> = adapter.records().iter().map(|r| r.timestamp).collect();
    assert_eq!(recorded, x.timestamps()[8..].to_vec());
    assert!(recorded.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn calibrating_on_a_window_reaching_the_target_is_a_leakage_error() {
    let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let (x, y) = single_column_data(&values);

    let run_config = classification_config(5);
    let mut adapter = ModelAdapter::new(
        "probe",
        Box::new(WindowProbe::default()),
        HyperGrid::new(),
        &run_config,
    );
    adapter.select_data(&x);

    // target timestamp sits inside the training window
    let target = x.timestamps()[9];
    let result = adapter.calibrate(&x, y.values(), target, &CalibrationConfig::default());
    assert!(matches!(result, Err(EnsembleError::LeakageRisk(_))));
}

#[test]
fn short_history_warns_and_produces_no_predictions() {
    let values: Vec<f64> = (0..8).map(|i| i as f64 * 0.1).collect();
    let (x, y) = single_column_data(&values);

    let run_config = classification_config(10);
    let mut adapter = ModelAdapter::new(
        "probe",
        Box::new(WindowProbe::default()),
        HyperGrid::new(),
        &run_config,
    );

    let report = WalkForwardDriver::new(10)
        .unwrap()
        .run(
            &mut adapter,
            &x,
            &y,
            &CalibrationConfig::default(),
            &run_config,
        )
        .unwrap();

    assert!(report.empty_history);
    assert_eq!(report.steps_run, 0);
    assert!(adapter.records().is_empty());
}

#[test]
fn skip_step_policy_records_missing_predictions_and_keeps_walking() {
    let values: Vec<f64> = (0..30).map(|i| i as f64 * 0.01).collect();
    let (x, y) = single_column_data(&values);

    let flaky = Flaky {
        calls: Arc::new(Mutex::new(0)),
        every: 3,
    };
    let run_config = classification_config(10).with_step_policy(StepPolicy::SkipStep);
    let mut adapter = ModelAdapter::new("flaky", Box::new(flaky), HyperGrid::new(), &run_config);

    let report = WalkForwardDriver::new(10)
        .unwrap()
        .run(
            &mut adapter,
            &x,
            &y,
            &CalibrationConfig::default(),
            &run_config,
        )
        .unwrap();

    assert!(report.steps_skipped > 0);
    assert_eq!(report.steps_run + report.steps_skipped, 20);
    assert_eq!(adapter.records().len(), report.steps_run);
}

#[test]
fn abort_policy_fails_the_model_on_the_first_bad_step() {
    let values: Vec<f64> = (0..30).map(|i| i as f64 * 0.01).collect();
    let (x, y) = single_column_data(&values);

    let flaky = Flaky {
        calls: Arc::new(Mutex::new(0)),
        every: 3,
    };
    let run_config = classification_config(10).with_step_policy(StepPolicy::AbortModel);
    let mut adapter = ModelAdapter::new("flaky", Box::new(flaky), HyperGrid::new(), &run_config);

    let result = WalkForwardDriver::new(10).unwrap().run(
        &mut adapter,
        &x,
        &y,
        &CalibrationConfig::default(),
        &run_config,
    );
    assert!(matches!(result, Err(EnsembleError::ModelError(_))));
}

#[test]
fn mismatched_indices_are_rejected() {
    let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
    let (x, _) = single_column_data(&values);
    let other_index = timestamps(25);
    let y = TimeSeries::new(other_index, vec![0.0; 25]).unwrap();

    let run_config = classification_config(5);
    let mut adapter = ModelAdapter::new(
        "probe",
        Box::new(WindowProbe::default()),
        HyperGrid::new(),
        &run_config,
    );

    let result = WalkForwardDriver::new(5).unwrap().run(
        &mut adapter,
        &x,
        &y,
        &CalibrationConfig::default(),
        &run_config,
    );
    assert!(matches!(
        result,
        Err(EnsembleError::InvalidConfiguration(_))
    ));
}
