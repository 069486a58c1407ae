//! Resampling onto a new time base, missing-sample handling and sample rate.

use ndarray::{Array1, ArrayD, Axis, IxDyn};
use tracing::{debug, instrument, warn};

use crate::error::SeriesError;
use crate::event::is_close;
use crate::interp::{Interpolant, Interpolation};
use crate::series::{Channels, TimeSeries};

/// Options for [`TimeSeries::resample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResampleOptions {
    /// Interpolation method. Default: linear.
    pub kind: Interpolation,
    /// Evaluate targets outside the original time range instead of
    /// returning NaN. Default: false.
    pub extrapolate: bool,
}

impl ResampleOptions {
    /// Linear interpolation without extrapolation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interpolation method.
    #[must_use]
    pub fn with_kind(mut self, kind: Interpolation) -> Self {
        self.kind = kind;
        self
    }

    /// Set whether out-of-range targets are extrapolated.
    #[must_use]
    pub fn with_extrapolate(mut self, extrapolate: bool) -> Self {
        self.extrapolate = extrapolate;
        self
    }
}

impl TimeSeries {
    /// Interpolate every channel onto `new_time`.
    ///
    /// Each channel is interpolated column by column over the samples that
    /// have no NaN component. Targets strictly between the neighbours of an
    /// original NaN sample are NaN again, so gaps survive resampling.
    /// Channels with fewer than two valid samples become all-NaN. Metadata
    /// and events are copied unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::InvalidResampleTarget`] if `new_time` is not
    /// finite and non-decreasing.
    #[instrument(skip(self, new_time), fields(from = self.len(), to = new_time.len(), kind = %options.kind))]
    pub fn resample(&self, new_time: &Array1<f64>, options: ResampleOptions) -> Result<Self, SeriesError> {
        validate_target(new_time)?;
        let targets = new_time.to_vec();
        let mut data = Channels::new();
        for (name, array) in &self.data {
            let out = resample_channel(
                name,
                array,
                self.time_slice(),
                &targets,
                options.kind,
                options.extrapolate,
                true,
            );
            data.insert(name.clone(), out);
        }
        debug!(channels = data.len(), "resampled");
        Ok(self.with_content(new_time.clone(), data, self.events.clone()))
    }

    /// Return the sample rate if the sampling period is constant.
    ///
    /// Returns `None` with fewer than two samples, when the periods differ
    /// beyond `1e-8 + 1e-5 * period`, or when the period is zero.
    #[must_use]
    pub fn get_sample_rate(&self) -> Option<f64> {
        let time = self.time_slice();
        if time.len() < 2 {
            return None;
        }
        let first = time[1] - time[0];
        if !time.windows(2).all(|w| is_close(w[1] - w[0], first)) {
            return None;
        }
        let period = (time[time.len() - 1] - time[0]) / (time.len() - 1) as f64;
        (period > 0.0).then(|| 1.0 / period)
    }

    /// Return one flag per sample, true when any component of the channel
    /// is NaN at that sample.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::ChannelNotFound`] if no such channel exists.
    pub fn isnan(&self, channel: &str) -> Result<Vec<bool>, SeriesError> {
        Ok(nan_rows(self.channel(channel)?))
    }

    /// Fill runs of at most `max_missing` consecutive NaN samples by
    /// interpolation (with extrapolation at the ends). Longer runs stay NaN
    /// and valid samples are never modified.
    #[instrument(skip(self), fields(samples = self.len()))]
    #[must_use]
    pub fn fill_missing_samples(&self, max_missing: usize, kind: Interpolation) -> Self {
        let time = self.time_slice();
        let mut data = Channels::new();
        for (name, array) in &self.data {
            let missing = nan_rows(array);
            if !missing.contains(&true) {
                data.insert(name.clone(), array.clone());
                continue;
            }
            let mut filled = resample_channel(name, array, time, time, kind, true, false);
            if filled.iter().all(|v| v.is_nan()) {
                data.insert(name.clone(), array.clone());
                continue;
            }
            let mut restored = 0;
            for (start, len) in nan_runs(&missing) {
                if len > max_missing {
                    for row in start..start + len {
                        filled.index_axis_mut(Axis(0), row).fill(f64::NAN);
                    }
                    restored += len;
                }
            }
            debug!(channel = %name, restored, "filled missing samples");
            data.insert(name.clone(), filled);
        }
        self.with_content(self.time.clone(), data, self.events.clone())
    }
}

/// Interpolate one channel onto `targets`.
///
/// With `restore_gaps`, targets strictly between the neighbours of an
/// original NaN row are set back to NaN.
pub(crate) fn resample_channel(
    name: &str,
    array: &ArrayD<f64>,
    time: &[f64],
    targets: &[f64],
    kind: Interpolation,
    extrapolate: bool,
    restore_gaps: bool,
) -> ArrayD<f64> {
    let n = time.len();
    let mut shape = array.shape().to_vec();
    shape[0] = targets.len();
    let width: usize = shape[1..].iter().product();

    let missing = nan_rows(array);
    let valid: Vec<usize> = (0..n).filter(|&i| !missing[i]).collect();
    if valid.len() < 2 {
        warn!(channel = %name, valid = valid.len(), "fewer than two valid samples, channel is all NaN");
        return ArrayD::from_elem(IxDyn(&shape), f64::NAN);
    }

    let rows = array
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((n, width))
        .expect("row count and width match the channel shape");
    let x: Vec<f64> = valid.iter().map(|&i| time[i]).collect();
    let mut out = vec![f64::NAN; targets.len() * width];
    for col in 0..width {
        let y: Vec<f64> = valid.iter().map(|&i| rows[[i, col]]).collect();
        let Some(interpolant) = Interpolant::new(kind, &x, &y) else {
            continue;
        };
        for (k, &t) in targets.iter().enumerate() {
            out[k * width + col] = interpolant.eval(t, extrapolate);
        }
    }

    if restore_gaps {
        for i in (0..n).filter(|&i| missing[i]) {
            let lo = if i == 0 { f64::NEG_INFINITY } else { time[i - 1] };
            let hi = if i + 1 == n { f64::INFINITY } else { time[i + 1] };
            for (k, &t) in targets.iter().enumerate() {
                if t > lo && t < hi {
                    out[k * width..(k + 1) * width].fill(f64::NAN);
                }
            }
        }
    }

    ArrayD::from_shape_vec(IxDyn(&shape), out).expect("output length matches shape")
}

/// Per-row NaN flags of a channel.
pub(crate) fn nan_rows(array: &ArrayD<f64>) -> Vec<bool> {
    array
        .axis_iter(Axis(0))
        .map(|row| row.iter().any(|v| v.is_nan()))
        .collect()
}

/// `(start, length)` of every run of true flags.
fn nan_runs(flags: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &flag) in flags.iter().enumerate() {
        match (flag, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i - s));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, flags.len() - s));
    }
    runs
}

fn validate_target(time: &Array1<f64>) -> Result<(), SeriesError> {
    if let Some(index) = time.iter().position(|t| !t.is_finite()) {
        return Err(SeriesError::InvalidResampleTarget {
            index,
            reason: "not finite",
        });
    }
    if let Some(index) = time.windows(2).into_iter().position(|w| w[1] < w[0]) {
        return Err(SeriesError::InvalidResampleTarget {
            index: index + 1,
            reason: "decreasing",
        });
    }
    Ok(())
}
