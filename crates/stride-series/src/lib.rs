//! Time-indexed, multi-channel measurement container.
//!
//! Pure data library with no I/O. A [`TimeSeries`] holds a time vector,
//! named n-dimensional channels sharing that time base, named events and
//! free-form metadata. It supports event editing, slicing by index, time
//! or event, merging, resampling with NaN-aware interpolation, and
//! conversion to a flat column table for codecs.

mod error;
mod event;
mod events;
mod info;
mod interp;
mod merge;
mod resample;
mod series;
mod slice;
mod table;

pub use error::{ErrorKind, SeriesError};
pub use event::Event;
pub use info::{InfoMap, InfoValue};
pub use interp::Interpolation;
pub use merge::MergeOptions;
pub use resample::ResampleOptions;
pub use series::{Channels, DataInfo, TimeSeries, TimeSeriesParts, UNIT_KEY};
pub use slice::SliceOptions;
pub use table::{TIME_COLUMN, Table};
