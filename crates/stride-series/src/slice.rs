//! Index lookup and extraction of sub-series by index, time or event.

use tracing::debug;

use crate::error::SeriesError;
use crate::event::Event;
use crate::series::{Channels, DataInfo, TimeSeries};

/// Options for time- and event-range extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceOptions {
    /// Keep the range bounds themselves (closed interval). Default: true.
    pub inclusive: bool,
    /// Shift the result so that the range start is at time zero. Default: false.
    pub rebase: bool,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            inclusive: true,
            rebase: false,
        }
    }
}

impl SliceOptions {
    /// Closed interval, absolute times.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the range bounds are kept.
    #[must_use]
    pub fn with_inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }

    /// Set whether the result is shifted so that the range starts at zero.
    #[must_use]
    pub fn with_rebase(mut self, rebase: bool) -> Self {
        self.rebase = rebase;
        self
    }
}

impl TimeSeries {
    /// Return the index of the sample nearest to `time`, the first one on ties.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::IndexNotFound`] if the series is empty or
    /// `time` is NaN.
    pub fn get_index_at_time(&self, time: f64) -> Result<usize, SeriesError> {
        let not_found = || SeriesError::IndexNotFound {
            time,
            policy: "nearest to",
        };
        if time.is_nan() {
            return Err(not_found());
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, &t) in self.time.iter().enumerate() {
            let distance = (t - time).abs();
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }
        best.map(|(i, _)| i).ok_or_else(not_found)
    }

    /// Return the largest index whose time is `<= time` (`<` if not inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::IndexNotFound`] if no sample qualifies.
    pub fn get_index_before_time(&self, time: f64, inclusive: bool) -> Result<usize, SeriesError> {
        let count = self.count_before(time, inclusive);
        count.checked_sub(1).ok_or(SeriesError::IndexNotFound {
            time,
            policy: if inclusive { "at or before" } else { "before" },
        })
    }

    /// Return the smallest index whose time is `>= time` (`>` if not inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::IndexNotFound`] if no sample qualifies.
    pub fn get_index_after_time(&self, time: f64, inclusive: bool) -> Result<usize, SeriesError> {
        let index = self.first_after(time, inclusive);
        if index < self.len() {
            Ok(index)
        } else {
            Err(SeriesError::IndexNotFound {
                time,
                policy: if inclusive { "at or after" } else { "after" },
            })
        }
    }

    /// Extract the samples between two indexes.
    ///
    /// The inclusive form keeps `index1..=index2`, the exclusive form
    /// `index1 + 1..index2`. Indexes past the end are clamped. Events are
    /// kept as they are.
    #[must_use]
    pub fn get_ts_between_indexes(&self, index1: usize, index2: usize, inclusive: bool) -> Self {
        let (start, end) = if inclusive {
            (index1, index2.saturating_add(1))
        } else {
            (index1.saturating_add(1), index2)
        };
        self.slice_rows(start, end, self.events.clone())
    }

    /// Extract the samples up to `index` (excluded if not inclusive).
    #[must_use]
    pub fn get_ts_before_index(&self, index: usize, inclusive: bool) -> Self {
        let end = if inclusive { index.saturating_add(1) } else { index };
        self.slice_rows(0, end, self.events.clone())
    }

    /// Extract the samples from `index` (excluded if not inclusive) to the end.
    #[must_use]
    pub fn get_ts_after_index(&self, index: usize, inclusive: bool) -> Self {
        let start = if inclusive { index } else { index.saturating_add(1) };
        self.slice_rows(start, self.len(), self.events.clone())
    }

    /// Extract the single sample nearest to `time`. Events are kept.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::IndexNotFound`] if the series is empty.
    pub fn get_ts_at_time(&self, time: f64) -> Result<Self, SeriesError> {
        let index = self.get_index_at_time(time)?;
        Ok(self.slice_rows(index, index + 1, self.events.clone()))
    }

    /// Extract the single sample nearest to an event occurrence.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::EventNotFound`] | The occurrence does not exist |
    /// | [`SeriesError::IndexNotFound`] | The series is empty |
    pub fn get_ts_at_event(&self, name: &str, occurrence: usize) -> Result<Self, SeriesError> {
        let time = self.get_event_time(name, occurrence)?;
        self.get_ts_at_time(time)
    }

    /// Extract the samples and events between two times.
    ///
    /// The bounds are swapped if given in reverse order. With
    /// `options.rebase`, the result is shifted so that the lower bound is
    /// at time zero; an unbounded lower bound is never rebased.
    #[must_use]
    pub fn get_ts_between_times(&self, time1: f64, time2: f64, options: SliceOptions) -> Self {
        let (lo, hi) = if time2 < time1 { (time2, time1) } else { (time1, time2) };
        let mut out = self.time_window(lo, hi, options.inclusive);
        if options.rebase && lo.is_finite() {
            out.translate(-lo);
        }
        debug!(lo, hi, samples = out.len(), "extracted time range");
        out
    }

    /// Extract the samples and events up to `time`.
    #[must_use]
    pub fn get_ts_before_time(&self, time: f64, inclusive: bool) -> Self {
        self.time_window(f64::NEG_INFINITY, time, inclusive)
    }

    /// Extract the samples and events from `time` on.
    #[must_use]
    pub fn get_ts_after_time(&self, time: f64, inclusive: bool) -> Self {
        self.time_window(time, f64::INFINITY, inclusive)
    }

    /// Extract the samples and events up to an event occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::EventNotFound`] if the occurrence does not exist.
    pub fn get_ts_before_event(
        &self,
        name: &str,
        occurrence: usize,
        inclusive: bool,
    ) -> Result<Self, SeriesError> {
        let time = self.get_event_time(name, occurrence)?;
        Ok(self.get_ts_before_time(time, inclusive))
    }

    /// Extract the samples and events from an event occurrence on.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::EventNotFound`] if the occurrence does not exist.
    pub fn get_ts_after_event(
        &self,
        name: &str,
        occurrence: usize,
        inclusive: bool,
    ) -> Result<Self, SeriesError> {
        let time = self.get_event_time(name, occurrence)?;
        Ok(self.get_ts_after_time(time, inclusive))
    }

    /// Extract the samples and events between two event occurrences.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::EventNotFound`] if either occurrence does not exist.
    pub fn get_ts_between_events(
        &self,
        name1: &str,
        occurrence1: usize,
        name2: &str,
        occurrence2: usize,
        options: SliceOptions,
    ) -> Result<Self, SeriesError> {
        let time1 = self.get_event_time(name1, occurrence1)?;
        let time2 = self.get_event_time(name2, occurrence2)?;
        Ok(self.get_ts_between_times(time1, time2, options))
    }

    /// Return a copy holding only the named channels and their metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::ChannelNotFound`] for the first absent name.
    pub fn get_subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, SeriesError> {
        let mut data = Channels::new();
        let mut data_info = DataInfo::new();
        for name in names {
            let name = name.as_ref();
            data.insert(name.to_string(), self.channel(name)?.clone());
            if let Some(info) = self.data_info.get(name) {
                data_info.insert(name.to_string(), info.clone());
            }
        }
        let mut out = self.with_content(self.time.clone(), data, self.events.clone());
        out.data_info = data_info;
        Ok(out)
    }

    /// Samples and events within `[lo, hi]`, or `(lo, hi)` if not inclusive.
    fn time_window(&self, lo: f64, hi: f64, inclusive: bool) -> Self {
        let start = self.first_after(lo, inclusive);
        let end = self.count_before(hi, inclusive);
        let in_range = |t: f64| {
            if inclusive {
                t >= lo && t <= hi
            } else {
                t > lo && t < hi
            }
        };
        let events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| in_range(e.time))
            .cloned()
            .collect();
        self.slice_rows(start, end.max(start), events)
    }

    /// Number of leading samples with time `<= t` (`< t` if not inclusive).
    fn count_before(&self, t: f64, inclusive: bool) -> usize {
        let time = self.time_slice();
        if inclusive {
            time.partition_point(|&x| x <= t)
        } else {
            time.partition_point(|&x| x < t)
        }
    }

    /// Index of the first sample with time `>= t` (`> t` if not inclusive).
    fn first_after(&self, t: f64, inclusive: bool) -> usize {
        let time = self.time_slice();
        if inclusive {
            time.partition_point(|&x| x < t)
        } else {
            time.partition_point(|&x| x <= t)
        }
    }
}
