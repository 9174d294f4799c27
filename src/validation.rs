//! Time-ordered cross-validation folds
//!
//! Folds respect time ordering: the training set of every fold is a strict
//! prefix of the window ending where that fold's validation slice begins.
//! There is deliberately no shuffling; shuffled folds on a time series leak
//! future information into training.

use crate::error::{EnsembleError, Result};
use std::ops::Range;

/// One (sub-train, validation) pair of row ranges inside a training window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub train: Range<usize>,
    pub validation: Range<usize>,
}

/// Split a window of `window_len` rows into `n_splits` ordered folds.
///
/// Validation slices are equally sized, consecutive and non-overlapping,
/// covering the tail of the window; whatever remains at the front seeds the
/// first fold's training prefix.
pub fn time_series_split(window_len: usize, n_splits: usize) -> Result<Vec<FoldSplit>> {
    if n_splits == 0 {
        return Err(EnsembleError::InvalidConfiguration(
            "n_splits must be positive".to_string(),
        ));
    }
    if window_len < n_splits + 1 {
        return Err(EnsembleError::InvalidConfiguration(format!(
            "Cannot form {} folds from a window of {} rows",
            n_splits, window_len
        )));
    }

    let fold_size = window_len / (n_splits + 1);
    let mut folds = Vec::with_capacity(n_splits);
    for j in 0..n_splits {
        let validation_end = window_len - (n_splits - 1 - j) * fold_size;
        let validation_start = validation_end - fold_size;
        folds.push(FoldSplit {
            train: 0..validation_start,
            validation: validation_start..validation_end,
        });
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_are_ordered_and_leak_free() {
        let folds = time_series_split(23, 4).unwrap();
        assert_eq!(folds.len(), 4);
        for fold in &folds {
            assert!(!fold.train.is_empty());
            assert!(!fold.validation.is_empty());
            // every validation index is past every training index
            assert_eq!(fold.train.end, fold.validation.start);
        }
        // validation slices are consecutive and end at the window boundary
        for pair in folds.windows(2) {
            assert_eq!(pair[0].validation.end, pair[1].validation.start);
        }
        assert_eq!(folds.last().unwrap().validation.end, 23);
    }

    #[test]
    fn rejects_windows_smaller_than_n_splits_plus_one() {
        assert!(time_series_split(5, 5).is_err());
        assert!(time_series_split(0, 1).is_err());
        assert!(time_series_split(6, 5).is_ok());
    }

    #[test]
    fn rejects_zero_splits() {
        assert!(time_series_split(10, 0).is_err());
    }
}
