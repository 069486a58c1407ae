//! Error types for cycle detection, normalization, stacking and selection.

use stride_series::{ErrorKind, SeriesError};

/// Errors from cycle analysis.
///
/// Cycles rejected by the detector's bounds are not errors; they are
/// dropped and logged.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// Returned when the detection channel holds more than one value per sample.
    #[error("channel \"{channel}\" must hold one value per sample, has shape {shape:?}")]
    NonScalarChannel {
        /// Name of the offending channel.
        channel: String,
        /// Shape of the channel.
        shape: Vec<usize>,
    },

    /// Returned when a point count is zero.
    #[error("number of points per cycle must be at least 1")]
    ZeroPoints,

    /// Returned when no point count is given and the series carries no
    /// positive `CyclePoints` time info entry to fall back on.
    #[error("number of points per cycle not given and time info has no positive \"CyclePoints\" entry")]
    MissingCyclePoints,

    /// Returned when a normalization span is empty, reversed or not finite.
    #[error("normalization span must satisfy start < end, got {start}..{end}")]
    InvalidSpan {
        /// Start of the span.
        start: f64,
        /// End of the span.
        end: f64,
    },

    /// Returned when a minimum bound exceeds its maximum or is NaN.
    #[error("invalid {what} bounds: min {min} must not exceed max {max}")]
    InvalidBounds {
        /// Which bound pair is invalid.
        what: &'static str,
        /// The lower bound.
        min: f64,
        /// The upper bound.
        max: f64,
    },

    /// Returned when the repeatability tolerance is not a positive number.
    #[error("tolerance must be positive and finite, got {tolerance}")]
    InvalidTolerance {
        /// The rejected tolerance.
        tolerance: f64,
    },

    /// Returned when an ensemble array does not match the cycle/point layout.
    #[error("channel \"{channel}\" has shape {got:?}, expected leading dimensions {expected:?}")]
    EnsembleShape {
        /// Name of the offending channel.
        channel: String,
        /// Expected `[cycles, points]` prefix.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// Wraps a time series error.
    #[error(transparent)]
    Series(#[from] SeriesError),
}

impl CycleError {
    /// Return the broad class of this error.
    ///
    /// Configuration and shape errors are structural; wrapped series errors
    /// keep their own class.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Series(e) => e.kind(),
            _ => ErrorKind::Structural,
        }
    }
}
