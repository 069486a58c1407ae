//! Time normalization of cycles delimited by events.
//!
//! Every cycle is resampled on the same number of points, and the cycles
//! are laid end to end in one long series whose time axis counts cycle
//! percentage: cycle `c`, point `p` of `n` sits at
//! `c * (end - start) + start + p * (end - start) / n`.

use ndarray::{Array1, Axis, Slice, concatenate};
use stride_series::{
    Channels, Event, InfoValue, Interpolation, ResampleOptions, TimeSeries, TimeSeriesParts,
    UNIT_KEY,
};
use tracing::{debug, info, instrument, warn};

use crate::error::CycleError;

/// Key of the point count in the normalized series' `time_info`.
pub const CYCLE_POINTS_KEY: &str = "CyclePoints";

/// Name of the event marking the start of every normalized cycle.
pub const CYCLE_START_EVENT: &str = "_";

/// Cycle time normalizer.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `n_points` | 100 |
/// | span | `0.0..100.0` (percent) |
/// | interpolation | [`Interpolation::Linear`] |
#[derive(Debug, Clone)]
pub struct TimeNormalizer {
    event1: String,
    event2: String,
    n_points: usize,
    span: (f64, f64),
    interpolation: Interpolation,
}

impl TimeNormalizer {
    /// Normalize cycles that start at `event1` and end at the next `event2`.
    ///
    /// When both names are equal, each cycle ends at the next occurrence of
    /// the same event.
    #[must_use]
    pub fn new(event1: impl Into<String>, event2: impl Into<String>) -> Self {
        Self {
            event1: event1.into(),
            event2: event2.into(),
            n_points: 100,
            span: (0.0, 100.0),
            interpolation: Interpolation::Linear,
        }
    }

    /// Set the number of points per cycle.
    #[must_use]
    pub fn with_n_points(mut self, n_points: usize) -> Self {
        self.n_points = n_points;
        self
    }

    /// Set the normalized time span of one cycle.
    #[must_use]
    pub fn with_span(mut self, start: f64, end: f64) -> Self {
        self.span = (start, end);
        self
    }

    /// Set the interpolation method used to resample each cycle.
    #[must_use]
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Return the number of points per cycle.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Return the `(begin, end)` times of every complete cycle in `ts`.
    ///
    /// A trailing occurrence of `event1` without a following `event2` is
    /// not a cycle.
    #[must_use]
    pub fn cycle_bounds(&self, ts: &TimeSeries) -> Vec<(f64, f64)> {
        let mut events: Vec<&Event> = ts.events().iter().collect();
        events.sort_by(|a, b| a.time_cmp(b));

        let mut bounds = Vec::new();
        for (k, begin) in events.iter().enumerate() {
            if begin.name != self.event1 {
                continue;
            }
            let end = events[k + 1..]
                .iter()
                .find(|e| e.name == self.event2 && e.time > begin.time);
            if let Some(end) = end {
                bounds.push((begin.time, end.time));
            }
        }
        bounds
    }

    /// Normalize every complete cycle of `ts` into one long series.
    ///
    /// Channel metadata is kept. Source events inside a cycle are mapped on
    /// the normalized axis, and [`CYCLE_START_EVENT`] marks each cycle
    /// start. Without any complete cycle, the result has no samples and
    /// every channel keeps its trailing dimensions.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CycleError::ZeroPoints`] | `n_points` is zero |
    /// | [`CycleError::InvalidSpan`] | The span is not a finite increasing range |
    #[instrument(skip(self, ts), fields(event1 = %self.event1, event2 = %self.event2, n = self.n_points))]
    pub fn normalize(&self, ts: &TimeSeries) -> Result<TimeSeries, CycleError> {
        if self.n_points == 0 {
            return Err(CycleError::ZeroPoints);
        }
        let (span_start, span_end) = self.span;
        if !(span_start.is_finite() && span_end.is_finite() && span_start < span_end) {
            return Err(CycleError::InvalidSpan {
                start: span_start,
                end: span_end,
            });
        }
        let width = span_end - span_start;
        let n = self.n_points;

        let bounds = self.cycle_bounds(ts);
        if bounds.is_empty() {
            warn!("no complete cycle found");
        }

        let options = ResampleOptions::new().with_kind(self.interpolation);
        let mut pieces: Vec<TimeSeries> = Vec::with_capacity(bounds.len());
        let mut time = Vec::with_capacity(bounds.len() * n);
        let mut events = Vec::new();
        for (c, &(begin, end)) in bounds.iter().enumerate() {
            let step = (end - begin) / n as f64;
            let targets = Array1::from_iter((0..n).map(|p| begin + p as f64 * step));
            pieces.push(ts.resample(&targets, options)?);

            let offset = c as f64 * width + span_start;
            time.extend((0..n).map(|p| offset + p as f64 * width / n as f64));
            events.push(Event::new(offset, CYCLE_START_EVENT));
            for event in ts.events() {
                if event.time >= begin && event.time < end {
                    let t = offset + (event.time - begin) / (end - begin) * width;
                    events.push(Event::new(t, event.name.clone()));
                }
            }
            debug!(cycle = c, begin, end, "cycle normalized");
        }

        let mut data = Channels::new();
        for (name, array) in ts.data() {
            let merged = if pieces.is_empty() {
                array.slice_axis(Axis(0), Slice::from(0..0)).to_owned()
            } else {
                let views: Vec<_> = pieces
                    .iter()
                    .map(|piece| piece.data()[name].view())
                    .collect();
                concatenate(Axis(0), &views).expect("cycles share trailing dimensions")
            };
            data.insert(name.clone(), merged);
        }

        let mut time_info = ts.time_info().clone();
        if self.span == (0.0, 100.0) {
            time_info.insert(UNIT_KEY.to_string(), InfoValue::from("%"));
        } else {
            time_info.remove(UNIT_KEY);
        }
        time_info.insert(CYCLE_POINTS_KEY.to_string(), InfoValue::Integer(n as i64));

        let mut out = TimeSeries::from_parts(TimeSeriesParts {
            time: Array1::from(time),
            time_info,
            data,
            data_info: ts.data_info().clone(),
            events: Vec::new(),
        })?;
        for event in events {
            out.add_unique_event(event.time, event.name);
        }
        out.sort_events();
        info!(cycles = bounds.len(), samples = out.len(), "time normalization complete");
        Ok(out)
    }
}

/// Normalize the cycles from `event1` to `event2` on `n_points` points each,
/// over the default 0-100 % span with linear interpolation.
///
/// # Errors
///
/// Same as [`TimeNormalizer::normalize`].
pub fn time_normalize(
    ts: &TimeSeries,
    event1: &str,
    event2: &str,
    n_points: usize,
) -> Result<TimeSeries, CycleError> {
    TimeNormalizer::new(event1, event2)
        .with_n_points(n_points)
        .normalize(ts)
}
