//! Two-threshold cycle detection on a scalar channel.
//!
//! A cycle has two phases. With rising polarity, phase 1 starts at the
//! first sample at or above `threshold1`, phase 2 starts at the next sample
//! at or below `threshold2`, and the cycle closes when the next phase 1
//! starts. A record that already starts above `threshold1` opens phase 1 at
//! its first sample. The gap between the two thresholds acts as hysteresis:
//! noise around one threshold cannot retrigger the phase it opened.
//!
//! A cycle still in phase 2 when the record ends is closed at the last
//! sample and flagged as truncated. A record ending in phase 1 yields no
//! cycle for that last phase.

use ndarray::ArrayD;
use stride_series::TimeSeries;
use tracing::{debug, info, instrument};

use crate::error::CycleError;

/// Side of `threshold1` that opens phase 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Phase 1 opens at or above `threshold1` (default).
    #[default]
    Rising,
    /// Phase 1 opens at or below `threshold1`.
    Falling,
}

/// Acceptance bounds for one phase of a cycle.
///
/// Infinite bounds disable the corresponding check. The peak of a phase is
/// its extreme value in the phase direction: with rising polarity, the
/// maximum over phase 1 and the minimum over phase 2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBounds {
    /// Minimum phase duration. Default: 0.
    pub min_duration: f64,
    /// Maximum phase duration. Default: +inf.
    pub max_duration: f64,
    /// Minimum peak value. Default: -inf.
    pub min_peak_height: f64,
    /// Maximum peak value. Default: +inf.
    pub max_peak_height: f64,
}

impl Default for PhaseBounds {
    fn default() -> Self {
        Self {
            min_duration: 0.0,
            max_duration: f64::INFINITY,
            min_peak_height: f64::NEG_INFINITY,
            max_peak_height: f64::INFINITY,
        }
    }
}

impl PhaseBounds {
    /// Unbounded phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration bounds.
    #[must_use]
    pub fn with_duration(mut self, min: f64, max: f64) -> Self {
        self.min_duration = min;
        self.max_duration = max;
        self
    }

    /// Set the peak height bounds.
    #[must_use]
    pub fn with_peak_height(mut self, min: f64, max: f64) -> Self {
        self.min_peak_height = min;
        self.max_peak_height = max;
        self
    }

    fn validate(&self, what: &'static str) -> Result<(), CycleError> {
        check_pair(what, self.min_duration, self.max_duration)?;
        check_pair(what, self.min_peak_height, self.max_peak_height)
    }

    fn accepts(&self, duration: f64, peak: f64) -> bool {
        duration >= self.min_duration
            && duration <= self.max_duration
            && peak >= self.min_peak_height
            && peak <= self.max_peak_height
    }
}

/// A complete cycle accepted by [`CycleDetector::find_cycles`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedCycle {
    /// Sample index where phase 1 starts.
    pub start_index: usize,
    /// Sample index where phase 2 starts.
    pub phase2_index: usize,
    /// Sample index where the cycle closes: the start of the next phase 1,
    /// or the last sample for a truncated cycle.
    pub end_index: usize,
    /// Time of `start_index`.
    pub start: f64,
    /// Time of `phase2_index`.
    pub phase2_start: f64,
    /// Time of `end_index`.
    pub end: f64,
    /// Extreme value over phase 1.
    pub phase1_peak: f64,
    /// Extreme value over phase 2.
    pub phase2_peak: f64,
    /// True when the record ended before the next phase 1 started.
    pub truncated: bool,
}

impl DetectedCycle {
    /// Return the cycle duration.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Two-threshold cycle detector.
///
/// Construct via [`CycleDetector::new`], then chain `with_*` methods to
/// override defaults.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | event names | `"phase1"`, `"phase2"` |
/// | end event name | `"_"` |
/// | polarity | [`Polarity::Rising`] |
/// | phase bounds | unbounded |
/// | cycle duration | `0..=inf` |
#[derive(Debug, Clone)]
pub struct CycleDetector {
    channel: String,
    threshold1: f64,
    threshold2: f64,
    event_names: (String, String),
    end_event_name: String,
    polarity: Polarity,
    phase1: PhaseBounds,
    phase2: PhaseBounds,
    cycle_min_duration: f64,
    cycle_max_duration: f64,
}

impl CycleDetector {
    /// Create a detector on `channel` with the phase 1 and phase 2 thresholds.
    #[must_use]
    pub fn new(channel: impl Into<String>, threshold1: f64, threshold2: f64) -> Self {
        Self {
            channel: channel.into(),
            threshold1,
            threshold2,
            event_names: ("phase1".to_string(), "phase2".to_string()),
            end_event_name: "_".to_string(),
            polarity: Polarity::Rising,
            phase1: PhaseBounds::default(),
            phase2: PhaseBounds::default(),
            cycle_min_duration: 0.0,
            cycle_max_duration: f64::INFINITY,
        }
    }

    /// Set the names of the events emitted at the phase 1 and phase 2 starts.
    #[must_use]
    pub fn with_event_names(mut self, name1: impl Into<String>, name2: impl Into<String>) -> Self {
        self.event_names = (name1.into(), name2.into());
        self
    }

    /// Set the name of the event emitted where a cycle closes.
    #[must_use]
    pub fn with_end_event_name(mut self, name: impl Into<String>) -> Self {
        self.end_event_name = name.into();
        self
    }

    /// Set the side of `threshold1` that opens phase 1.
    #[must_use]
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Set the acceptance bounds of phase 1.
    #[must_use]
    pub fn with_phase1(mut self, bounds: PhaseBounds) -> Self {
        self.phase1 = bounds;
        self
    }

    /// Set the acceptance bounds of phase 2.
    #[must_use]
    pub fn with_phase2(mut self, bounds: PhaseBounds) -> Self {
        self.phase2 = bounds;
        self
    }

    /// Set the accepted range of the whole cycle duration.
    #[must_use]
    pub fn with_cycle_bounds(mut self, min_duration: f64, max_duration: f64) -> Self {
        self.cycle_min_duration = min_duration;
        self.cycle_max_duration = max_duration;
        self
    }

    /// Return the channel scanned for cycles.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Return the names of the phase 1 and phase 2 events.
    #[must_use]
    pub fn event_names(&self) -> (&str, &str) {
        (&self.event_names.0, &self.event_names.1)
    }

    /// Return the name of the cycle end event.
    #[must_use]
    pub fn end_event_name(&self) -> &str {
        &self.end_event_name
    }

    /// Scan the channel and return the accepted cycles in time order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CycleError::Series`] | The channel does not exist |
    /// | [`CycleError::NonScalarChannel`] | The channel holds more than one value per sample |
    /// | [`CycleError::InvalidBounds`] | A minimum bound exceeds its maximum |
    #[instrument(skip(self, ts), fields(channel = %self.channel, samples = ts.len()))]
    pub fn find_cycles(&self, ts: &TimeSeries) -> Result<Vec<DetectedCycle>, CycleError> {
        self.phase1.validate("phase 1")?;
        self.phase2.validate("phase 2")?;
        check_pair("cycle duration", self.cycle_min_duration, self.cycle_max_duration)?;

        let values = scalar_values(&self.channel, ts.channel(&self.channel)?)?;
        let time = ts.time().to_vec();

        let mut cycles = Vec::new();
        let mut rejected = 0usize;
        let mut state = Phase::Idle;
        for (i, &value) in values.iter().enumerate() {
            if value.is_nan() {
                continue;
            }
            let opens_phase1 = match self.polarity {
                Polarity::Rising => value >= self.threshold1,
                Polarity::Falling => value <= self.threshold1,
            };
            let opens_phase2 = match self.polarity {
                Polarity::Rising => value <= self.threshold2,
                Polarity::Falling => value >= self.threshold2,
            };
            state = match state {
                Phase::Idle if opens_phase1 => Phase::First { start: i },
                Phase::First { start } if opens_phase2 => Phase::Second { start, phase2: i },
                Phase::Second { start, phase2 } if opens_phase1 => {
                    let cycle = self.measure(&values, &time, start, phase2, i, false);
                    self.keep(cycle, &mut cycles, &mut rejected);
                    Phase::First { start: i }
                }
                unchanged => unchanged,
            };
        }
        if let Phase::Second { start, phase2 } = state
            && let Some(last) = values.len().checked_sub(1)
            && last > phase2
        {
            let cycle = self.measure(&values, &time, start, phase2, last, true);
            self.keep(cycle, &mut cycles, &mut rejected);
        }
        info!(accepted = cycles.len(), rejected, "cycle scan complete");
        Ok(cycles)
    }

    /// Return a copy of `ts` with one event triple per accepted cycle,
    /// events sorted. Channel data is unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`CycleDetector::find_cycles`].
    pub fn detect(&self, ts: &TimeSeries) -> Result<TimeSeries, CycleError> {
        let cycles = self.find_cycles(ts)?;
        let mut out = ts.clone();
        for cycle in &cycles {
            out.add_event(cycle.start, self.event_names.0.as_str());
            out.add_event(cycle.phase2_start, self.event_names.1.as_str());
            out.add_event(cycle.end, self.end_event_name.as_str());
        }
        out.sort_events();
        Ok(out)
    }

    fn keep(&self, cycle: DetectedCycle, cycles: &mut Vec<DetectedCycle>, rejected: &mut usize) {
        if self.accepts(&cycle) {
            cycles.push(cycle);
        } else {
            *rejected += 1;
            debug!(start = cycle.start, end = cycle.end, truncated = cycle.truncated, "cycle rejected");
        }
    }

    fn measure(
        &self,
        values: &[f64],
        time: &[f64],
        start: usize,
        phase2: usize,
        end: usize,
        truncated: bool,
    ) -> DetectedCycle {
        type Pick = fn(f64, f64) -> f64;
        let (pick1, pick2): (Pick, Pick) = match self.polarity {
            Polarity::Rising => (f64::max, f64::min),
            Polarity::Falling => (f64::min, f64::max),
        };
        // a truncated cycle's last sample still belongs to phase 2
        let phase2_end = if truncated { end + 1 } else { end };
        let (peak1, peak2) = (
            extreme(&values[start..phase2], pick1),
            extreme(&values[phase2..phase2_end], pick2),
        );
        DetectedCycle {
            start_index: start,
            phase2_index: phase2,
            end_index: end,
            start: time[start],
            phase2_start: time[phase2],
            end: time[end],
            phase1_peak: peak1,
            phase2_peak: peak2,
            truncated,
        }
    }

    fn accepts(&self, cycle: &DetectedCycle) -> bool {
        let duration = cycle.duration();
        self.phase1
            .accepts(cycle.phase2_start - cycle.start, cycle.phase1_peak)
            && self.phase2.accepts(cycle.end - cycle.phase2_start, cycle.phase2_peak)
            && duration >= self.cycle_min_duration
            && duration <= self.cycle_max_duration
    }
}

/// Detect cycles with `detector` and return a copy of `ts` with the events.
///
/// # Errors
///
/// Same as [`CycleDetector::find_cycles`].
pub fn detect_cycles(ts: &TimeSeries, detector: &CycleDetector) -> Result<TimeSeries, CycleError> {
    detector.detect(ts)
}

/// State of the left-to-right scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the first phase 1 sample.
    Idle,
    /// Inside phase 1.
    First { start: usize },
    /// Inside phase 2.
    Second { start: usize, phase2: usize },
}

/// Values of a channel holding one value per sample (`[N]` or `[N, 1]`).
pub(crate) fn scalar_values(channel: &str, array: &ArrayD<f64>) -> Result<Vec<f64>, CycleError> {
    match array.shape() {
        [_] | [_, 1] => Ok(array.iter().copied().collect()),
        shape => Err(CycleError::NonScalarChannel {
            channel: channel.to_string(),
            shape: shape.to_vec(),
        }),
    }
}

/// Extreme of the finite values, NaN when there is none.
fn extreme(values: &[f64], pick: fn(f64, f64) -> f64) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(pick)
        .unwrap_or(f64::NAN)
}

fn check_pair(what: &'static str, min: f64, max: f64) -> Result<(), CycleError> {
    if min.is_nan() || max.is_nan() || min > max {
        return Err(CycleError::InvalidBounds { what, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2, array};

    use super::*;

    /// Square-ish wave sampled at 1 Hz: high for 3 samples, low for 2.
    fn pulses(n_cycles: usize) -> TimeSeries {
        let pattern = [0.0, 10.0, 10.0, 10.0, 0.0];
        let values: Vec<f64> = (0..n_cycles).flat_map(|_| pattern).chain([0.0, 10.0]).collect();
        let time = Array1::from_iter((0..values.len()).map(|i| i as f64));
        let mut ts = TimeSeries::new(time).unwrap();
        ts.add_data("F", Array1::from(values).into_dyn()).unwrap();
        ts
    }

    #[test]
    fn finds_every_complete_cycle() {
        let ts = pulses(3);
        let cycles = CycleDetector::new("F", 5.0, 5.0).find_cycles(&ts).unwrap();
        assert_eq!(cycles.len(), 3);
        assert_eq!(cycles[0].start_index, 1);
        assert_eq!(cycles[0].phase2_index, 4);
        assert_eq!(cycles[0].end_index, 6);
        assert_eq!(cycles[0].phase1_peak, 10.0);
        assert_eq!(cycles[0].phase2_peak, 0.0);
        assert_eq!(cycles[2].end, 16.0);
    }

    #[test]
    fn detect_adds_sorted_event_triples() {
        let ts = pulses(2);
        let detector = CycleDetector::new("F", 5.0, 5.0).with_event_names("push", "recovery");
        let out = detect_cycles(&ts, &detector).unwrap();
        let names: Vec<_> = out.events().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["push", "recovery", "_", "push", "recovery", "_"]);
        assert_eq!(out.channel("F").unwrap(), ts.channel("F").unwrap());
        assert!(ts.events().is_empty());
    }

    #[test]
    fn record_ending_in_phase2_closes_at_last_sample() {
        let time = Array1::from_iter((0..6).map(f64::from));
        let mut ts = TimeSeries::new(time).unwrap();
        ts.add_data("F", array![0.0, 10.0, 10.0, 0.0, 1.0, 0.0].into_dyn()).unwrap();
        let cycles = CycleDetector::new("F", 5.0, 5.0).find_cycles(&ts).unwrap();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].truncated);
        assert_eq!(cycles[0].phase2_index, 3);
        assert_eq!(cycles[0].end_index, 5);
        assert_eq!(cycles[0].duration(), 4.0);
        assert_eq!(cycles[0].phase2_peak, 0.0);
    }

    #[test]
    fn record_ending_in_phase1_yields_no_cycle() {
        let time = Array1::from_iter((0..4).map(f64::from));
        let mut ts = TimeSeries::new(time).unwrap();
        ts.add_data("F", array![0.0, 10.0, 10.0, 10.0].into_dyn()).unwrap();
        assert!(CycleDetector::new("F", 5.0, 5.0).find_cycles(&ts).unwrap().is_empty());
    }

    #[test]
    fn record_starting_above_threshold_opens_at_first_sample() {
        let time = Array1::from_iter((0..6).map(f64::from));
        let mut ts = TimeSeries::new(time).unwrap();
        ts.add_data("F", array![5.0, 10.0, 0.0, 0.0, 10.0, 10.0].into_dyn()).unwrap();
        let cycles = CycleDetector::new("F", 5.0, 5.0).find_cycles(&ts).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].start_index, 0);
        assert_eq!(cycles[0].end_index, 4);
        assert!(!cycles[0].truncated);
    }

    #[test]
    fn truncated_cycle_is_subject_to_bounds() {
        let time = Array1::from_iter((0..6).map(f64::from));
        let mut ts = TimeSeries::new(time).unwrap();
        ts.add_data("F", array![0.0, 10.0, 0.0, 0.0, 0.0, 0.0].into_dyn()).unwrap();
        let cycles = CycleDetector::new("F", 5.0, 5.0)
            .with_cycle_bounds(0.0, 3.0)
            .find_cycles(&ts)
            .unwrap();
        assert!(cycles.is_empty());
    }

    #[test]
    fn hysteresis_ignores_chatter() {
        // dips to 4 inside phase 1 stay above threshold2 = 2
        let values = array![0.0, 10.0, 4.0, 10.0, 0.0, 10.0];
        let time = Array1::from_iter((0..6).map(f64::from));
        let mut ts = TimeSeries::new(time).unwrap();
        ts.add_data("F", values.into_dyn()).unwrap();
        let cycles = CycleDetector::new("F", 5.0, 2.0).find_cycles(&ts).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].phase2_index, 4);
    }

    #[test]
    fn falling_polarity_mirrors_rising() {
        let ts = pulses(2);
        let mut inverted = ts.clone();
        inverted.map_channel("F", |a| a.mapv(|v| 10.0 - v)).unwrap();
        let rising = CycleDetector::new("F", 5.0, 5.0).find_cycles(&ts).unwrap();
        let falling = CycleDetector::new("F", 5.0, 5.0)
            .with_polarity(Polarity::Falling)
            .find_cycles(&inverted)
            .unwrap();
        assert_eq!(rising.len(), falling.len());
        assert_eq!(rising[1].start, falling[1].start);
        assert_eq!(falling[0].phase1_peak, 0.0);
    }

    #[test]
    fn bounds_reject_cycles() {
        let ts = pulses(3);
        let short_phase1 = CycleDetector::new("F", 5.0, 5.0)
            .with_phase1(PhaseBounds::new().with_duration(0.0, 2.0))
            .find_cycles(&ts)
            .unwrap();
        assert!(short_phase1.is_empty());

        let low_peak = CycleDetector::new("F", 5.0, 5.0)
            .with_phase1(PhaseBounds::new().with_peak_height(20.0, f64::INFINITY))
            .find_cycles(&ts)
            .unwrap();
        assert!(low_peak.is_empty());

        let whole = CycleDetector::new("F", 5.0, 5.0)
            .with_cycle_bounds(4.5, 5.5)
            .find_cycles(&ts)
            .unwrap();
        assert_eq!(whole.len(), 3);
    }

    #[test]
    fn nan_samples_are_skipped() {
        let values = array![0.0, 10.0, f64::NAN, f64::NAN, 0.0, 10.0];
        let time = Array1::from_iter((0..6).map(f64::from));
        let mut ts = TimeSeries::new(time).unwrap();
        ts.add_data("F", values.into_dyn()).unwrap();
        let cycles = CycleDetector::new("F", 5.0, 5.0).find_cycles(&ts).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].phase2_index, 4);
        assert_eq!(cycles[0].phase1_peak, 10.0);
    }

    #[test]
    fn rejects_vector_channel() {
        let mut ts = TimeSeries::new(array![0.0, 1.0]).unwrap();
        ts.add_data("F", Array2::<f64>::zeros((2, 3)).into_dyn()).unwrap();
        let err = CycleDetector::new("F", 1.0, 1.0).find_cycles(&ts).unwrap_err();
        assert!(matches!(err, CycleError::NonScalarChannel { .. }));
    }

    #[test]
    fn column_channel_is_scalar() {
        let mut ts = pulses(1);
        let column = ts.channel("F").unwrap().clone().into_shape_with_order((7, 1)).unwrap();
        ts.add_data("F", column.into_dyn()).unwrap();
        assert_eq!(CycleDetector::new("F", 5.0, 5.0).find_cycles(&ts).unwrap().len(), 1);
    }

    #[test]
    fn missing_channel_and_bad_bounds() {
        let ts = pulses(1);
        assert!(matches!(
            CycleDetector::new("G", 5.0, 5.0).find_cycles(&ts),
            Err(CycleError::Series(_))
        ));
        assert!(matches!(
            CycleDetector::new("F", 5.0, 5.0)
                .with_cycle_bounds(3.0, 1.0)
                .find_cycles(&ts),
            Err(CycleError::InvalidBounds { .. })
        ));
    }
}
