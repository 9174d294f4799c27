//! Second-stage dataset assembly and core-vs-base comparison

use crate::data::FeatureMatrix;
use crate::error::{EnsembleError, Result};
use crate::metrics::Scoring;
use crate::models::ModelAdapter;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Build the core feature matrix from the base models' prediction records:
/// one column per model, one row per timestamp at which *every* model
/// predicted (intersection join).
pub fn core_dataset(adapters: &[&ModelAdapter]) -> Result<FeatureMatrix> {
    if adapters.is_empty() {
        return Err(EnsembleError::InvalidConfiguration(
            "Core dataset needs at least one base model".to_string(),
        ));
    }

    let mut common: Option<BTreeSet<DateTime<Utc>>> = None;
    let mut by_model: Vec<BTreeMap<DateTime<Utc>, f64>> = Vec::with_capacity(adapters.len());
    for adapter in adapters {
        let mut map = BTreeMap::new();
        for record in adapter.records() {
            map.insert(record.timestamp, record.value);
        }
        let timestamps: BTreeSet<DateTime<Utc>> = map.keys().copied().collect();
        common = Some(match common {
            None => timestamps,
            Some(seen) => seen.intersection(&timestamps).copied().collect(),
        });
        by_model.push(map);
    }

    let index: Vec<DateTime<Utc>> = common.unwrap_or_default().into_iter().collect();
    let mut rows = Vec::with_capacity(index.len());
    for ts in &index {
        let mut row = Vec::with_capacity(by_model.len());
        for map in &by_model {
            let value = map.get(ts).ok_or_else(|| {
                EnsembleError::DataError(format!("Timestamp {} lost during intersection", ts))
            })?;
            row.push(*value);
        }
        rows.push(row);
    }

    let columns = adapters.iter().map(|a| a.name().to_string()).collect();
    FeatureMatrix::new(index, columns, rows)
}

/// Compare the core model's score against every base model's. A base model
/// beating the core is a diagnostic, never a failure: the warning is logged
/// and returned for the caller to surface.
pub fn compare_with_base(
    core: &ModelAdapter,
    bases: &[&ModelAdapter],
    scoring: Scoring,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let Some(core_score) = core.score(scoring) else {
        warn!(
            model = core.name(),
            %scoring,
            "core model produced no score; skipping comparison"
        );
        return warnings;
    };

    for base in bases {
        if let Some(base_score) = base.score(scoring) {
            if base_score > core_score {
                let message = format!(
                    "{} scored {:.4} on {}, beating the core model {} at {:.4}",
                    base.name(),
                    base_score,
                    scoring,
                    core.name(),
                    core_score
                );
                warn!("{}", message);
                warnings.push(message);
            }
        }
    }
    warnings
}
