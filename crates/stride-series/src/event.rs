//! Named time markers attached to a time series.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named instant, e.g. the start of a push or a heel strike.
///
/// The time does not need to coincide with a sample of the series. Several
/// events may share a name; they are then told apart by their occurrence,
/// the zero-based rank of the event among same-named events in time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event time, in the unit of the owning series' time vector.
    pub time: f64,
    /// Event name.
    pub name: String,
}

impl Event {
    /// Create a new event.
    #[must_use]
    pub fn new(time: f64, name: impl Into<String>) -> Self {
        Self {
            time,
            name: name.into(),
        }
    }

    /// Order two events by time using [`f64::total_cmp`].
    #[must_use]
    pub fn time_cmp(&self, other: &Self) -> Ordering {
        self.time.total_cmp(&other.time)
    }

    /// Return true if both events have the same name and nearly the same time.
    ///
    /// Uses the tolerance `1e-8 + 1e-5 * |other.time|`.
    #[must_use]
    pub fn is_duplicate_of(&self, other: &Self) -> bool {
        self.name == other.name && is_close(self.time, other.time)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.time)
    }
}

pub(crate) fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Indexes of the events named `name`, ordered by time then insertion order.
pub(crate) fn occurrences(events: &[Event], name: &str) -> Vec<usize> {
    let mut indexes: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.name == name)
        .map(|(i, _)| i)
        .collect();
    // sort_by is stable, ties keep insertion order
    indexes.sort_by(|&a, &b| events[a].time_cmp(&events[b]));
    indexes
}
