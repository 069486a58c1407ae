//! Error types for the time series container.

/// Broad class of a [`SeriesError`], for callers that branch on the kind of
/// failure rather than on the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The container or an argument violates a shape or ordering invariant.
    Structural,
    /// A named channel, event occurrence or qualifying index does not exist.
    Lookup,
    /// Two series cannot be combined as requested.
    Conflict,
}

/// Errors from time series construction, lookup, slicing and merging.
#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    /// Returned when a channel's leading dimension differs from the time length.
    #[error("channel \"{channel}\" has {got} samples along axis 0, expected {expected}")]
    ChannelLength {
        /// Name of the offending channel.
        channel: String,
        /// Length of the time vector.
        expected: usize,
        /// Leading dimension of the channel.
        got: usize,
    },

    /// Returned when a channel array has no axis at all.
    #[error("channel \"{channel}\" must have at least one dimension")]
    ZeroDimensional {
        /// Name of the offending channel.
        channel: String,
    },

    /// Returned when the time vector contains a non-finite value.
    #[error("time vector contains non-finite value at index {index}")]
    NonFiniteTime {
        /// Position of the first non-finite time.
        index: usize,
    },

    /// Returned when a time shift is NaN or infinite.
    #[error("cannot shift the series by non-finite offset {delta}")]
    NonFiniteShift {
        /// The rejected offset.
        delta: f64,
    },

    /// Returned when the time vector decreases.
    #[error("time vector decreases at index {index} ({previous} -> {current})")]
    DecreasingTime {
        /// Position of the first decreasing sample.
        index: usize,
        /// Time of the sample before `index`.
        previous: f64,
        /// Time at `index`.
        current: f64,
    },

    /// Returned when a resampling target is not finite and non-decreasing.
    #[error("invalid resample target at index {index}: {reason}")]
    InvalidResampleTarget {
        /// Position of the first invalid target time.
        index: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Returned when a channel transform changes the channel's shape.
    #[error("transform of channel \"{channel}\" changed its shape from {before:?} to {after:?}")]
    ShapeChanged {
        /// Name of the transformed channel.
        channel: String,
        /// Shape before the transform.
        before: Vec<usize>,
        /// Shape after the transform.
        after: Vec<usize>,
    },

    /// Returned when a table cannot be regrouped into channels.
    #[error("malformed table: {reason}")]
    MalformedTable {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a requested channel does not exist.
    #[error("channel \"{channel}\" not found")]
    ChannelNotFound {
        /// The missing channel name.
        channel: String,
    },

    /// Returned when a requested event occurrence does not exist.
    #[error("occurrence {occurrence} of event \"{name}\" not found")]
    EventNotFound {
        /// The event name looked up.
        name: String,
        /// The zero-based occurrence looked up.
        occurrence: usize,
    },

    /// Returned when no sample satisfies an index query.
    #[error("no sample {policy} time {time}")]
    IndexNotFound {
        /// The queried time.
        time: f64,
        /// Human-readable lookup policy (e.g. "at or before").
        policy: &'static str,
    },

    /// Returned when merging would overwrite an existing channel.
    #[error("channel \"{channel}\" exists in both series and overwrite is disabled")]
    MergeConflict {
        /// The colliding channel name.
        channel: String,
    },

    /// Returned when merging two series whose time vectors differ.
    #[error("time vectors differ ({self_len} vs {other_len} samples) and resampling is disabled")]
    TimeMismatch {
        /// Number of samples in the destination.
        self_len: usize,
        /// Number of samples in the source.
        other_len: usize,
    },
}

impl SeriesError {
    /// Return the broad class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChannelLength { .. }
            | Self::ZeroDimensional { .. }
            | Self::NonFiniteTime { .. }
            | Self::NonFiniteShift { .. }
            | Self::DecreasingTime { .. }
            | Self::InvalidResampleTarget { .. }
            | Self::ShapeChanged { .. }
            | Self::MalformedTable { .. } => ErrorKind::Structural,
            Self::ChannelNotFound { .. }
            | Self::EventNotFound { .. }
            | Self::IndexNotFound { .. } => ErrorKind::Lookup,
            Self::MergeConflict { .. } | Self::TimeMismatch { .. } => ErrorKind::Conflict,
        }
    }
}
