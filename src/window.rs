//! Rolling training windows

use crate::error::{EnsembleError, Result};
use std::ops::Range;

/// Contiguous half-open range of row indices `[target - size, target)` used
/// as the training set for a prediction at row `target`.
///
/// Built exclusively through [`RollingWindow::trailing`], so every window in
/// the crate ends strictly before its prediction target and has exactly the
/// configured length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindow {
    start: usize,
    end: usize,
}

impl RollingWindow {
    /// Trailing window of exactly `size` rows ending just before `target`.
    pub fn trailing(target: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(EnsembleError::InvalidConfiguration(
                "Window size must be positive".to_string(),
            ));
        }
        if target < size {
            return Err(EnsembleError::InvalidConfiguration(format!(
                "Target row {} precedes a full window of {} rows",
                target, size
            )));
        }
        Ok(Self {
            start: target - size,
            end: target,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last training row; equal to the prediction target.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row < self.end
    }
}
