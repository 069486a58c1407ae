//! Selection of the most repeatable cycles of an ensemble.
//!
//! Cycles are compared pairwise by mean squared difference. The cycle
//! farthest from the others is removed, one at a time, while its mean
//! dissimilarity exceeds `tolerance` times the median of the remaining
//! cycles' means.

use ndarray::{ArrayD, Axis};
use tracing::{debug, info, instrument};

use crate::dissimilarity::DissimilarityMatrix;
use crate::error::CycleError;

/// Configuration of the repeatability selector.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `tolerance` | 2.0 |
/// | `min_cycles` | 2 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepeatabilityConfig {
    pub(crate) tolerance: f64,
    pub(crate) min_cycles: usize,
}

impl Default for RepeatabilityConfig {
    fn default() -> Self {
        Self {
            tolerance: 2.0,
            min_cycles: 2,
        }
    }
}

impl RepeatabilityConfig {
    /// Create a configuration with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the multiple of the median mean dissimilarity above which a
    /// cycle is removed.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the number of cycles below which nothing more is removed.
    #[must_use]
    pub fn with_min_cycles(mut self, min_cycles: usize) -> Self {
        self.min_cycles = min_cycles;
        self
    }

    /// Return the tolerance.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Return the minimum number of kept cycles.
    #[must_use]
    pub fn min_cycles(&self) -> usize {
        self.min_cycles
    }

    /// Select the most repeatable cycles of `data`, shaped `[cycles, ...]`.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::InvalidTolerance`] if the tolerance is not a
    /// positive finite number.
    #[instrument(skip(self, data), fields(shape = ?data.shape(), tolerance = self.tolerance))]
    pub fn select(&self, data: &ArrayD<f64>) -> Result<Repeatability, CycleError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(CycleError::InvalidTolerance {
                tolerance: self.tolerance,
            });
        }
        let cycles: Vec<Vec<f64>> = if data.ndim() == 0 {
            Vec::new()
        } else {
            data.axis_iter(Axis(0))
                .map(|cycle| cycle.iter().copied().collect())
                .collect()
        };

        let (valid, nan_cycles): (Vec<usize>, Vec<usize>) =
            (0..cycles.len()).partition(|&i| cycles[i].iter().any(|v| v.is_finite()));
        if !nan_cycles.is_empty() {
            debug!(?nan_cycles, "cycles without finite values excluded");
        }
        let matrix = DissimilarityMatrix::from_cycles(&cycles);

        let mut members = valid;
        let mut rejected = Vec::new();
        let mut bound = f64::NAN;
        let mut means: Vec<f64> = members.iter().map(|&i| matrix.mean_to(i, &members)).collect();
        while members.len() >= 2 {
            bound = self.tolerance * median(&means);
            let Some((worst, &worst_mean)) = means
                .iter()
                .enumerate()
                .filter(|(_, m)| !m.is_nan())
                .reduce(|best, item| if item.1 >= best.1 { item } else { best })
            else {
                break;
            };
            if worst_mean <= bound || members.len() <= self.min_cycles {
                break;
            }
            let removed = members.remove(worst);
            debug!(cycle = removed, mean = worst_mean, bound, "cycle rejected");
            rejected.push(removed);
            means = members.iter().map(|&i| matrix.mean_to(i, &members)).collect();
        }

        info!(
            selected = members.len(),
            rejected = rejected.len(),
            nan = nan_cycles.len(),
            "repeatability selection complete"
        );
        Ok(Repeatability {
            selected: members,
            rejected,
            nan_cycles,
            bound,
            mean_dissimilarity: means,
        })
    }
}

/// Outcome of the repeatability selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Repeatability {
    /// Kept cycles, in their original order.
    pub selected: Vec<usize>,
    /// Removed cycles, in removal order.
    pub rejected: Vec<usize>,
    /// Cycles without any finite value, never compared.
    pub nan_cycles: Vec<usize>,
    /// Final rejection bound; NaN when fewer than two cycles were compared.
    pub bound: f64,
    /// Mean dissimilarity of each selected cycle to the other selected
    /// cycles, aligned with `selected`.
    pub mean_dissimilarity: Vec<f64>,
}

/// Select the most repeatable cycles of `data` with the default configuration.
///
/// # Errors
///
/// Same as [`RepeatabilityConfig::select`].
pub fn most_repeatable_cycles(data: &ArrayD<f64>) -> Result<Repeatability, CycleError> {
    RepeatabilityConfig::default().select(data)
}

/// Median of the non-NaN values; NaN if there is none.
fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
