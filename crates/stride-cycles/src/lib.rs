//! Cycle analysis on time series.
//!
//! Detects repeating motion cycles with a two-threshold detector, time
//! normalizes the cycles between events, stacks them into an ensemble and
//! selects the most repeatable ones. Pure computation with no I/O.

mod detect;
mod dissimilarity;
mod ensemble;
mod error;
mod normalize;
mod repeatability;

pub use detect::{CycleDetector, DetectedCycle, PhaseBounds, Polarity, detect_cycles};
pub use dissimilarity::{DissimilarityMatrix, mean_squared_difference};
pub use ensemble::{Ensemble, stack, unstack};
pub use error::CycleError;
pub use normalize::{CYCLE_POINTS_KEY, CYCLE_START_EVENT, TimeNormalizer, time_normalize};
pub use repeatability::{Repeatability, RepeatabilityConfig, most_repeatable_cycles};
