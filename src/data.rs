//! Time series data handling for the walk-forward harness

use crate::error::{EnsembleError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

/// An ordered sequence of (timestamp, value) pairs with strictly increasing
/// timestamps and no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    index: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(index: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(EnsembleError::DataError(format!(
                "Index length ({}) doesn't match values length ({})",
                index.len(),
                values.len()
            )));
        }
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EnsembleError::DataError(
                "Timestamps must be strictly increasing with no duplicates".to_string(),
            ));
        }
        Ok(Self { index, values })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Contiguous sub-series over a row range.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.end > self.len() || range.start > range.end {
            return Err(EnsembleError::DataError(format!(
                "Slice {}..{} out of bounds for series of length {}",
                range.start,
                range.end,
                self.len()
            )));
        }
        Ok(Self {
            index: self.index[range.clone()].to_vec(),
            values: self.values[range].to_vec(),
        })
    }

    /// Keep only the rows whose timestamps appear in `index`. Every requested
    /// timestamp must exist in the series.
    pub fn restrict_to(&self, index: &[DateTime<Utc>]) -> Result<Self> {
        let by_ts: BTreeMap<DateTime<Utc>, f64> = self
            .index
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .collect();

        let mut values = Vec::with_capacity(index.len());
        for ts in index {
            match by_ts.get(ts) {
                Some(v) => values.push(*v),
                None => {
                    return Err(EnsembleError::DataError(format!(
                        "Timestamp {} not present in series",
                        ts
                    )))
                }
            }
        }
        Self::new(index.to_vec(), values)
    }

    /// Simple returns of a price series. The result starts at the second
    /// timestamp.
    pub fn returns(&self) -> Result<Self> {
        if self.len() < 2 {
            return Err(EnsembleError::DataError(
                "Need at least two observations to compute returns".to_string(),
            ));
        }
        let mut values = Vec::with_capacity(self.len() - 1);
        for w in self.values.windows(2) {
            if w[0] == 0.0 {
                return Err(EnsembleError::DataError(
                    "Cannot compute a return from a zero price".to_string(),
                ));
            }
            values.push((w[1] - w[0]) / w[0]);
        }
        Self::new(self.index[1..].to_vec(), values)
    }
}

/// Timestamp-indexed numeric matrix with named columns, row-major storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    index: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(
        index: Vec<DateTime<Utc>>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if index.len() != rows.len() {
            return Err(EnsembleError::DataError(format!(
                "Index length ({}) doesn't match row count ({})",
                index.len(),
                rows.len()
            )));
        }
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EnsembleError::DataError(
                "Timestamps must be strictly increasing with no duplicates".to_string(),
            ));
        }
        if rows.iter().any(|r| r.len() != columns.len()) {
            return Err(EnsembleError::DataError(
                "Every row must have one value per column".to_string(),
            ));
        }
        Ok(Self {
            index,
            columns,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Contiguous sub-matrix over a row range.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.end > self.len() || range.start > range.end {
            return Err(EnsembleError::DataError(format!(
                "Slice {}..{} out of bounds for matrix of length {}",
                range.start,
                range.end,
                self.len()
            )));
        }
        Ok(Self {
            index: self.index[range.clone()].to_vec(),
            columns: self.columns.clone(),
            rows: self.rows[range].to_vec(),
        })
    }

    /// A copy containing only the requested columns, in the requested order.
    /// Pure: `self` is left untouched.
    pub fn select_columns(&self, which: &[usize]) -> Result<Self> {
        if let Some(&bad) = which.iter().find(|&&c| c >= self.width()) {
            return Err(EnsembleError::DataError(format!(
                "Column index {} out of bounds for width {}",
                bad,
                self.width()
            )));
        }
        let columns = which.iter().map(|&c| self.columns[c].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| which.iter().map(|&c| r[c]).collect())
            .collect();
        Ok(Self {
            index: self.index.clone(),
            columns,
            rows,
        })
    }
}

/// Lag matrix of `y`: the row at timestamp `t` holds `y[t - lag]` for each
/// requested lag. Usable rows start at `max(lags)`, so the matrix index is a
/// strict suffix of `y`'s.
pub fn lagged(y: &TimeSeries, lags: &[usize]) -> Result<FeatureMatrix> {
    if lags.is_empty() {
        return Err(EnsembleError::InvalidConfiguration(
            "At least one lag is required".to_string(),
        ));
    }
    if lags.contains(&0) {
        return Err(EnsembleError::InvalidConfiguration(
            "Lag 0 is the target itself, not a feature".to_string(),
        ));
    }
    let max_lag = *lags.iter().max().unwrap_or(&0);
    if y.len() <= max_lag {
        return Err(EnsembleError::DataError(format!(
            "Series of length {} too short for max lag {}",
            y.len(),
            max_lag
        )));
    }

    let columns = lags.iter().map(|lag| format!("lag_{}", lag)).collect();
    let values = y.values();
    let mut index = Vec::with_capacity(y.len() - max_lag);
    let mut rows = Vec::with_capacity(y.len() - max_lag);
    for i in max_lag..y.len() {
        index.push(y.timestamps()[i]);
        rows.push(lags.iter().map(|lag| values[i - lag]).collect());
    }
    FeatureMatrix::new(index, columns, rows)
}

/// Map continuous returns to class labels: above `threshold` is 1, below
/// `-threshold` is -1, in between is 0. A zero threshold collapses the label
/// set to binary by sign.
pub fn to_class(y: &TimeSeries, threshold: f64) -> Result<TimeSeries> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(EnsembleError::InvalidConfiguration(
            "threshold must be a non-negative finite number".to_string(),
        ));
    }
    let values = y
        .values()
        .iter()
        .map(|&v| {
            if threshold > 0.0 {
                if v > threshold {
                    1.0
                } else if v < -threshold {
                    -1.0
                } else {
                    0.0
                }
            } else if v >= 0.0 {
                1.0
            } else {
                -1.0
            }
        })
        .collect();
    TimeSeries::new(y.timestamps().to_vec(), values)
}

/// Loader for timestamp/value CSV files.
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a two-column CSV (timestamp, value) with a header row. Timestamps
    /// may be RFC 3339 or plain `YYYY-MM-DD` dates.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut index = Vec::new();
        let mut values = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let ts_field = record.get(0).ok_or_else(|| {
                EnsembleError::DataError(format!("Row {}: missing timestamp column", line + 1))
            })?;
            let value_field = record.get(1).ok_or_else(|| {
                EnsembleError::DataError(format!("Row {}: missing value column", line + 1))
            })?;

            index.push(parse_timestamp(ts_field).ok_or_else(|| {
                EnsembleError::DataError(format!(
                    "Row {}: unparseable timestamp '{}'",
                    line + 1,
                    ts_field
                ))
            })?);
            values.push(value_field.trim().parse::<f64>().map_err(|_| {
                EnsembleError::DataError(format!(
                    "Row {}: unparseable value '{}'",
                    line + 1,
                    value_field
                ))
            })?);
        }
        TimeSeries::new(index, values)
    }
}

fn parse_timestamp(field: &str) -> Option<DateTime<Utc>> {
    let field = field.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(field) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(field, "%Y-%m-%d").ok()?;
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
