//! Stacking a long normalized series into a cycle ensemble and back.

use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn, Slice};
use stride_series::{Channels, DataInfo, Event, InfoMap, SeriesError, TimeSeries, TimeSeriesParts};
use tracing::{info, instrument, warn};

use crate::error::CycleError;
use crate::normalize::CYCLE_POINTS_KEY;

/// Cycles laid out along a leading axis.
///
/// Every channel has shape `[cycles, points, ...]` and the time matrix has
/// shape `[cycles, points]`. Events and metadata are those of the long
/// series the ensemble was stacked from.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    time: Array2<f64>,
    data: Channels,
    time_info: InfoMap,
    data_info: DataInfo,
    events: Vec<Event>,
}

impl Ensemble {
    /// Build an ensemble from a time matrix and `[cycles, points, ...]` channels.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::EnsembleShape`] if a channel's two leading
    /// dimensions differ from the time matrix.
    pub fn from_channels(time: Array2<f64>, data: Channels) -> Result<Self, CycleError> {
        let expected = time.shape().to_vec();
        for (name, array) in &data {
            if array.ndim() < 2 || array.shape()[..2] != expected[..] {
                return Err(CycleError::EnsembleShape {
                    channel: name.clone(),
                    expected,
                    got: array.shape().to_vec(),
                });
            }
        }
        Ok(Self {
            time,
            data,
            time_info: InfoMap::new(),
            data_info: DataInfo::new(),
            events: Vec::new(),
        })
    }

    /// Attach events.
    #[must_use]
    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    /// Attach time metadata.
    #[must_use]
    pub fn with_time_info(mut self, time_info: InfoMap) -> Self {
        self.time_info = time_info;
        self
    }

    /// Attach channel metadata.
    #[must_use]
    pub fn with_data_info(mut self, data_info: DataInfo) -> Self {
        self.data_info = data_info;
        self
    }

    /// Return the number of cycles.
    #[must_use]
    pub fn n_cycles(&self) -> usize {
        self.time.nrows()
    }

    /// Return the number of points per cycle.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.time.ncols()
    }

    /// Return the `[cycles, points]` time matrix.
    #[must_use]
    pub fn time(&self) -> &Array2<f64> {
        &self.time
    }

    /// Return all channels.
    #[must_use]
    pub fn data(&self) -> &Channels {
        &self.data
    }

    /// Return one channel.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::ChannelNotFound`] (wrapped) if no such channel exists.
    pub fn channel(&self, name: &str) -> Result<&ArrayD<f64>, CycleError> {
        self.data.get(name).ok_or_else(|| {
            SeriesError::ChannelNotFound {
                channel: name.to_string(),
            }
            .into()
        })
    }

    /// Return the time metadata.
    #[must_use]
    pub fn time_info(&self) -> &InfoMap {
        &self.time_info
    }

    /// Return the channel metadata.
    #[must_use]
    pub fn data_info(&self) -> &DataInfo {
        &self.data_info
    }

    /// Return the events.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Return an ensemble holding only the given cycles, in the given order.
    ///
    /// # Panics
    ///
    /// Panics if a cycle index is out of bounds.
    #[must_use]
    pub fn select_cycles(&self, cycles: &[usize]) -> Self {
        Self {
            time: self.time.select(Axis(0), cycles),
            data: self
                .data
                .iter()
                .map(|(name, array)| (name.clone(), array.select(Axis(0), cycles)))
                .collect(),
            time_info: self.time_info.clone(),
            data_info: self.data_info.clone(),
            events: self.events.clone(),
        }
    }
}

/// Group the samples of `ts` into cycles of `n_points` consecutive samples.
///
/// Sample `i` goes to cycle `i / n_points`. A trailing group shorter than
/// `n_points` is dropped. Without `n_points`, the `CyclePoints` entry that
/// [`time_normalize`](crate::time_normalize) writes into the time info is used.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`CycleError::ZeroPoints`] | `n_points` is zero |
/// | [`CycleError::MissingCyclePoints`] | `n_points` is `None` and the time info has no positive `CyclePoints` |
#[instrument(skip(ts), fields(samples = ts.len()))]
pub fn stack(ts: &TimeSeries, n_points: Option<usize>) -> Result<Ensemble, CycleError> {
    let n_points = match n_points {
        Some(0) => return Err(CycleError::ZeroPoints),
        Some(n) => n,
        None => ts
            .time_info()
            .get(CYCLE_POINTS_KEY)
            .and_then(|v| v.as_integer())
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or(CycleError::MissingCyclePoints)?,
    };
    let n_cycles = ts.len() / n_points;
    let leftover = ts.len() % n_points;
    if leftover > 0 {
        warn!(leftover, n_points, "dropping incomplete trailing cycle");
    }
    let total = n_cycles * n_points;

    let time = ts
        .time()
        .slice_axis(Axis(0), Slice::from(0..total))
        .to_owned()
        .into_shape_with_order((n_cycles, n_points))
        .expect("total is a multiple of n_points");
    let mut data = Channels::new();
    for (name, array) in ts.data() {
        let mut shape = vec![n_cycles, n_points];
        shape.extend_from_slice(&array.shape()[1..]);
        let stacked = array
            .slice_axis(Axis(0), Slice::from(0..total))
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(&shape))
            .expect("total is a multiple of n_points");
        data.insert(name.clone(), stacked);
    }

    info!(n_cycles, "stacked");
    Ok(Ensemble::from_channels(time, data)?
        .with_events(ts.events().to_vec())
        .with_time_info(ts.time_info().clone())
        .with_data_info(ts.data_info().clone()))
}

/// Lay the cycles of an ensemble end to end again.
///
/// `unstack(&stack(ts, Some(n))?)` reproduces `ts` when its length is a multiple
/// of `n`.
///
/// # Errors
///
/// Returns a wrapped [`SeriesError`] if the flattened time matrix is not a
/// valid time vector (e.g. decreasing between cycles).
pub fn unstack(ensemble: &Ensemble) -> Result<TimeSeries, CycleError> {
    let total = ensemble.n_cycles() * ensemble.n_points();
    let time: Array1<f64> = ensemble.time.iter().copied().collect();
    let mut data = Channels::new();
    for (name, array) in &ensemble.data {
        let mut shape = vec![total];
        shape.extend_from_slice(&array.shape()[2..]);
        let flat = array
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(&shape))
            .expect("cycles times points equals the flattened length");
        data.insert(name.clone(), flat);
    }
    let ts = TimeSeries::from_parts(TimeSeriesParts {
        time,
        time_info: ensemble.time_info.clone(),
        data,
        data_info: ensemble.data_info.clone(),
        events: ensemble.events.clone(),
    })?;
    Ok(ts)
}
