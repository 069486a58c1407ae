//! The time series container: a shared time base, named channels, events
//! and metadata.

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayD, Axis, Slice};

use crate::error::SeriesError;
use crate::event::Event;
use crate::info::{InfoMap, InfoValue};

/// Channel map: channel name to an array whose axis 0 is time.
pub type Channels = BTreeMap<String, ArrayD<f64>>;

/// Per-channel metadata map.
pub type DataInfo = BTreeMap<String, InfoMap>;

/// Key of the time unit in `time_info`.
pub const UNIT_KEY: &str = "Unit";

/// Plain components of a [`TimeSeries`].
///
/// This is the exchange format for codecs: a reader fills a
/// `TimeSeriesParts` and calls [`TimeSeries::from_parts`]; a writer calls
/// [`TimeSeries::into_parts`] or [`TimeSeries::to_parts`].
#[derive(Debug, Clone)]
pub struct TimeSeriesParts {
    /// Time vector.
    pub time: Array1<f64>,
    /// Metadata of the time vector.
    pub time_info: InfoMap,
    /// Channel arrays.
    pub data: Channels,
    /// Channel metadata.
    pub data_info: DataInfo,
    /// Events, in storage order.
    pub events: Vec<Event>,
}

impl Default for TimeSeriesParts {
    fn default() -> Self {
        Self {
            time: Array1::zeros(0),
            time_info: default_time_info(),
            data: Channels::new(),
            data_info: DataInfo::new(),
            events: Vec::new(),
        }
    }
}

/// Time-indexed, multi-channel measurement container.
///
/// Invariants, checked at construction and at every mutation that can break
/// them:
/// - `time` is finite and non-decreasing;
/// - every channel has at least one axis, and its axis 0 has `time.len()`
///   samples.
///
/// Events are kept in insertion order; [`TimeSeries::sort_events`] orders
/// them explicitly and occurrence lookups always rank by time regardless
/// of storage order. `Clone` is a deep copy.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub(crate) time: Array1<f64>,
    pub(crate) time_info: InfoMap,
    pub(crate) data: Channels,
    pub(crate) data_info: DataInfo,
    pub(crate) events: Vec<Event>,
}

impl Default for TimeSeries {
    fn default() -> Self {
        Self {
            time: Array1::zeros(0),
            time_info: default_time_info(),
            data: Channels::new(),
            data_info: DataInfo::new(),
            events: Vec::new(),
        }
    }
}

fn default_time_info() -> InfoMap {
    let mut info = InfoMap::new();
    info.insert(UNIT_KEY.to_string(), InfoValue::from("s"));
    info
}

impl TimeSeries {
    /// Create a series with the given time vector, no channels and no events.
    ///
    /// `time_info` defaults to `{"Unit": "s"}`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::NonFiniteTime`] | A time is NaN or infinite |
    /// | [`SeriesError::DecreasingTime`] | The time vector decreases |
    pub fn new(time: Array1<f64>) -> Result<Self, SeriesError> {
        validate_time(&time)?;
        Ok(Self {
            time: standard(time),
            ..Self::default()
        })
    }

    /// Build a series from its components, validating every invariant.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::NonFiniteTime`] | A time is NaN or infinite |
    /// | [`SeriesError::DecreasingTime`] | The time vector decreases |
    /// | [`SeriesError::ZeroDimensional`] | A channel has no axis |
    /// | [`SeriesError::ChannelLength`] | A channel's axis 0 differs from the time length |
    pub fn from_parts(parts: TimeSeriesParts) -> Result<Self, SeriesError> {
        let TimeSeriesParts {
            time,
            time_info,
            data,
            data_info,
            events,
        } = parts;
        validate_time(&time)?;
        let n = time.len();
        let mut channels = Channels::new();
        for (name, array) in data {
            validate_channel(&name, &array, n)?;
            channels.insert(name, standard_d(array));
        }
        Ok(Self {
            time: standard(time),
            time_info,
            data: channels,
            data_info,
            events,
        })
    }

    /// Consume the series and return its components.
    #[must_use]
    pub fn into_parts(self) -> TimeSeriesParts {
        TimeSeriesParts {
            time: self.time,
            time_info: self.time_info,
            data: self.data,
            data_info: self.data_info,
            events: self.events,
        }
    }

    /// Return a deep copy of the series' components.
    #[must_use]
    pub fn to_parts(&self) -> TimeSeriesParts {
        self.clone().into_parts()
    }

    /// Return the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Return true if the time vector is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Return the time vector.
    #[must_use]
    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    /// Return the time vector as a slice.
    pub(crate) fn time_slice(&self) -> &[f64] {
        self.time
            .as_slice()
            .expect("time vector is kept in standard layout")
    }

    /// Replace the time vector.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::NonFiniteTime`] | A time is NaN or infinite |
    /// | [`SeriesError::DecreasingTime`] | The time vector decreases |
    /// | [`SeriesError::ChannelLength`] | The new length differs from an existing channel |
    pub fn set_time(&mut self, time: Array1<f64>) -> Result<(), SeriesError> {
        validate_time(&time)?;
        for (name, array) in &self.data {
            validate_channel(name, array, time.len())?;
        }
        self.time = standard(time);
        Ok(())
    }

    /// Return the metadata of the time vector.
    #[must_use]
    pub fn time_info(&self) -> &InfoMap {
        &self.time_info
    }

    /// Set a metadata entry of the time vector.
    pub fn add_time_info(&mut self, key: impl Into<String>, value: impl Into<InfoValue>) {
        self.time_info.insert(key.into(), value.into());
    }

    /// Remove a metadata entry of the time vector, returning it if present.
    pub fn remove_time_info(&mut self, key: &str) -> Option<InfoValue> {
        self.time_info.remove(key)
    }

    /// Return all channels.
    #[must_use]
    pub fn data(&self) -> &Channels {
        &self.data
    }

    /// Return the channel names in order.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.data.keys().map(String::as_str)
    }

    /// Return true if a channel with this name exists.
    #[must_use]
    pub fn contains_channel(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    /// Return a channel by name.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::ChannelNotFound`] if no such channel exists.
    pub fn channel(&self, name: &str) -> Result<&ArrayD<f64>, SeriesError> {
        self.data.get(name).ok_or_else(|| SeriesError::ChannelNotFound {
            channel: name.to_string(),
        })
    }

    /// Add a channel, replacing any channel of the same name.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::ZeroDimensional`] | `array` has no axis |
    /// | [`SeriesError::ChannelLength`] | `array`'s axis 0 differs from the time length |
    pub fn add_data(
        &mut self,
        name: impl Into<String>,
        array: ArrayD<f64>,
    ) -> Result<(), SeriesError> {
        let name = name.into();
        validate_channel(&name, &array, self.len())?;
        self.data.insert(name, standard_d(array));
        Ok(())
    }

    /// Remove a channel and its metadata, returning the array if present.
    pub fn remove_data(&mut self, name: &str) -> Option<ArrayD<f64>> {
        self.data_info.remove(name);
        self.data.remove(name)
    }

    /// Rename a channel and its metadata. Does nothing if `old` does not exist.
    pub fn rename_data(&mut self, old: &str, new: impl Into<String>) {
        let new = new.into();
        if let Some(array) = self.data.remove(old) {
            self.data.insert(new.clone(), array);
        }
        if let Some(info) = self.data_info.remove(old) {
            self.data_info.insert(new, info);
        }
    }

    /// Replace a channel by a same-shape transform of itself.
    ///
    /// This is the entry point for filters: they see the raw array and never
    /// the events.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::ChannelNotFound`] | No such channel |
    /// | [`SeriesError::ShapeChanged`] | The transform returned a different shape |
    pub fn map_channel<F>(&mut self, name: &str, f: F) -> Result<(), SeriesError>
    where
        F: FnOnce(&ArrayD<f64>) -> ArrayD<f64>,
    {
        let array = self.channel(name)?;
        let mapped = f(array);
        if mapped.shape() != array.shape() {
            return Err(SeriesError::ShapeChanged {
                channel: name.to_string(),
                before: array.shape().to_vec(),
                after: mapped.shape().to_vec(),
            });
        }
        self.data.insert(name.to_string(), standard_d(mapped));
        Ok(())
    }

    /// Return all channel metadata.
    #[must_use]
    pub fn data_info(&self) -> &DataInfo {
        &self.data_info
    }

    /// Return the metadata of one channel, if any was set.
    #[must_use]
    pub fn channel_info(&self, name: &str) -> Option<&InfoMap> {
        self.data_info.get(name)
    }

    /// Set a metadata entry of a channel.
    ///
    /// The channel does not need to exist yet, so metadata can be declared
    /// before the data is added.
    pub fn add_data_info(
        &mut self,
        channel: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<InfoValue>,
    ) {
        self.data_info
            .entry(channel.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Remove a metadata entry of a channel, returning it if present.
    pub fn remove_data_info(&mut self, channel: &str, key: &str) -> Option<InfoValue> {
        self.data_info.get_mut(channel)?.remove(key)
    }

    /// Return the events in storage order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Re-validate every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, as in [`TimeSeries::from_parts`].
    pub fn check_well_formed(&self) -> Result<(), SeriesError> {
        validate_time(&self.time)?;
        for (name, array) in &self.data {
            validate_channel(name, array, self.len())?;
        }
        Ok(())
    }

    /// Compare numeric content within a tolerance.
    ///
    /// Time and channel values match when `|a - b| <= atol + rtol * |b|` or
    /// both are NaN; event times use the same rule. Metadata must be equal.
    #[must_use]
    pub fn is_equivalent(&self, other: &Self, atol: f64, rtol: f64) -> bool {
        let close = |a: f64, b: f64| (a.is_nan() && b.is_nan()) || (a - b).abs() <= atol + rtol * b.abs();
        self.time.len() == other.time.len()
            && self.time.iter().zip(other.time.iter()).all(|(&a, &b)| close(a, b))
            && self.data.len() == other.data.len()
            && self.data.iter().all(|(name, a)| {
                other.data.get(name).is_some_and(|b| {
                    a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(&x, &y)| close(x, y))
                })
            })
            && self.time_info == other.time_info
            && self.data_info == other.data_info
            && self.events.len() == other.events.len()
            && self
                .events
                .iter()
                .zip(&other.events)
                .all(|(a, b)| a.name == b.name && close(a.time, b.time))
    }

    /// Copy the metadata and events of `self` onto a new time base and channels.
    ///
    /// Callers guarantee that `data` agrees with `time`.
    pub(crate) fn with_content(&self, time: Array1<f64>, data: Channels, events: Vec<Event>) -> Self {
        Self {
            time: standard(time),
            time_info: self.time_info.clone(),
            data,
            data_info: self.data_info.clone(),
            events,
        }
    }

    /// Copy of the samples in `start..end`, keeping metadata and the given events.
    pub(crate) fn slice_rows(&self, start: usize, end: usize, events: Vec<Event>) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);
        let time = self
            .time
            .slice_axis(Axis(0), Slice::from(start..end))
            .to_owned();
        let data = self
            .data
            .iter()
            .map(|(name, array)| {
                let rows = array
                    .slice_axis(Axis(0), Slice::from(start..end))
                    .to_owned();
                (name.clone(), rows)
            })
            .collect();
        self.with_content(time, data, events)
    }
}

impl PartialEq for TimeSeries {
    /// Exact comparison of every component. NaN compares equal to NaN in
    /// time and channel values so that series with missing samples can
    /// equal their copies.
    fn eq(&self, other: &Self) -> bool {
        self.is_equivalent(other, 0.0, 0.0)
    }
}

fn validate_time(time: &Array1<f64>) -> Result<(), SeriesError> {
    if let Some(index) = time.iter().position(|t| !t.is_finite()) {
        return Err(SeriesError::NonFiniteTime { index });
    }
    for (index, pair) in time.windows(2).into_iter().enumerate() {
        if pair[1] < pair[0] {
            return Err(SeriesError::DecreasingTime {
                index: index + 1,
                previous: pair[0],
                current: pair[1],
            });
        }
    }
    Ok(())
}

fn validate_channel(name: &str, array: &ArrayD<f64>, n: usize) -> Result<(), SeriesError> {
    match array.shape().first() {
        None => Err(SeriesError::ZeroDimensional {
            channel: name.to_string(),
        }),
        Some(&got) if got != n => Err(SeriesError::ChannelLength {
            channel: name.to_string(),
            expected: n,
            got,
        }),
        Some(_) => Ok(()),
    }
}

fn standard(time: Array1<f64>) -> Array1<f64> {
    if time.is_standard_layout() {
        time
    } else {
        time.as_standard_layout().into_owned()
    }
}

fn standard_d(array: ArrayD<f64>) -> ArrayD<f64> {
    if array.is_standard_layout() {
        array
    } else {
        array.as_standard_layout().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, IxDyn, array};

    use super::*;
    use crate::error::ErrorKind;

    fn ramp(n: usize) -> TimeSeries {
        let time = Array1::from_iter((0..n).map(|i| i as f64 * 0.1));
        let mut ts = TimeSeries::new(time).unwrap();
        ts.add_data("signal", Array1::from_iter((0..n).map(|i| i as f64)).into_dyn())
            .unwrap();
        ts
    }

    #[test]
    fn default_time_unit_is_seconds() {
        let ts = TimeSeries::default();
        assert_eq!(ts.time_info()[UNIT_KEY], InfoValue::from("s"));
        assert!(ts.is_empty());
    }

    #[test]
    fn rejects_nan_time() {
        let result = TimeSeries::new(array![0.0, f64::NAN, 2.0]);
        assert!(matches!(result, Err(SeriesError::NonFiniteTime { index: 1 })));
    }

    #[test]
    fn rejects_decreasing_time() {
        let result = TimeSeries::new(array![0.0, 2.0, 1.0]);
        assert!(matches!(result, Err(SeriesError::DecreasingTime { index: 2, .. })));
    }

    #[test]
    fn accepts_repeated_times() {
        assert!(TimeSeries::new(array![0.0, 1.0, 1.0, 2.0]).is_ok());
    }

    #[test]
    fn add_data_checks_length() {
        let mut ts = ramp(5);
        let err = ts
            .add_data("short", Array1::<f64>::zeros(4).into_dyn())
            .unwrap_err();
        assert!(matches!(
            err,
            SeriesError::ChannelLength { expected: 5, got: 4, .. }
        ));
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(!ts.contains_channel("short"));
    }

    #[test]
    fn add_data_rejects_scalar_array() {
        let mut ts = ramp(1);
        let scalar = ArrayD::<f64>::zeros(IxDyn(&[]));
        assert!(matches!(
            ts.add_data("s", scalar),
            Err(SeriesError::ZeroDimensional { .. })
        ));
    }

    #[test]
    fn set_time_checks_channels() {
        let mut ts = ramp(5);
        let err = ts.set_time(array![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, SeriesError::ChannelLength { .. }));
        assert_eq!(ts.len(), 5);
    }

    #[test]
    fn from_parts_validates_every_channel() {
        let mut parts = TimeSeriesParts {
            time: array![0.0, 1.0, 2.0],
            ..TimeSeriesParts::default()
        };
        parts.data.insert("ok".into(), array![1.0, 2.0, 3.0].into_dyn());
        parts.data.insert("bad".into(), array![1.0, 2.0].into_dyn());
        assert!(matches!(
            TimeSeries::from_parts(parts),
            Err(SeriesError::ChannelLength { ref channel, .. }) if channel == "bad"
        ));
    }

    #[test]
    fn parts_round_trip() {
        let mut ts = ramp(4);
        ts.add_data_info("signal", "Unit", "N");
        ts.add_event(0.15, "push");
        let back = TimeSeries::from_parts(ts.to_parts()).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn clone_is_deep() {
        let mut ts = ramp(4);
        ts.add_data_info("signal", "Unit", "N");
        ts.add_event(0.1, "push");
        let mut copy = ts.clone();
        assert_eq!(copy, ts);

        copy.map_channel("signal", |a| a.mapv(|v| v * 2.0)).unwrap();
        copy.add_data_info("signal", "Unit", "kN");
        copy.add_event(0.2, "recovery");
        copy.shift(1.0).unwrap();

        assert_ne!(copy, ts);
        assert_eq!(ts.channel("signal").unwrap()[[1]], 1.0);
        assert_eq!(ts.channel_info("signal").unwrap()["Unit"], InfoValue::from("N"));
        assert_eq!(ts.events().len(), 1);
        assert_eq!(ts.time()[0], 0.0);
    }

    #[test]
    fn equality_treats_nan_as_equal() {
        let mut ts = ramp(3);
        ts.add_data("gap", array![1.0, f64::NAN, 3.0].into_dyn()).unwrap();
        assert_eq!(ts.clone(), ts);
    }

    #[test]
    fn equality_detects_shape_difference() {
        let time = array![0.0, 1.0];
        let mut a = TimeSeries::new(time.clone()).unwrap();
        let mut b = TimeSeries::new(time).unwrap();
        a.add_data("x", Array2::<f64>::zeros((2, 2)).into_dyn()).unwrap();
        b.add_data("x", Array2::<f64>::zeros((2, 1)).into_dyn()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn equivalence_uses_tolerance() {
        let a = ramp(3);
        let mut b = a.clone();
        b.map_channel("signal", |x| x.mapv(|v| v + 1e-9)).unwrap();
        assert_ne!(a, b);
        assert!(a.is_equivalent(&b, 1e-6, 0.0));
    }

    #[test]
    fn rename_and_remove_follow_metadata() {
        let mut ts = ramp(3);
        ts.add_data_info("signal", "Unit", "m");
        ts.rename_data("signal", "position");
        assert!(ts.contains_channel("position"));
        assert_eq!(ts.channel_info("position").unwrap()["Unit"], InfoValue::from("m"));
        assert!(ts.channel_info("signal").is_none());

        ts.rename_data("missing", "other");
        assert!(!ts.contains_channel("other"));

        assert!(ts.remove_data("position").is_some());
        assert!(ts.data().is_empty());
        assert!(ts.data_info().is_empty());
    }

    #[test]
    fn data_info_add_and_remove() {
        let mut ts = TimeSeries::default();
        ts.add_data_info("Forces", "Unit", "N");
        ts.add_data_info("Marker1", "Color", vec![43.0, 2.0, 255.0]);
        assert_eq!(ts.channel_info("Forces").unwrap()["Unit"], InfoValue::from("N"));
        assert_eq!(ts.remove_data_info("Forces", "Unit"), Some(InfoValue::from("N")));
        assert!(ts.channel_info("Forces").unwrap().is_empty());
        assert_eq!(ts.remove_data_info("Nothing", "Unit"), None);
    }

    #[test]
    fn map_channel_rejects_shape_change() {
        let mut ts = ramp(3);
        let err = ts
            .map_channel("signal", |_| Array2::<f64>::zeros((3, 2)).into_dyn())
            .unwrap_err();
        assert!(matches!(err, SeriesError::ShapeChanged { .. }));
    }

    #[test]
    fn channel_lookup_error_kind() {
        let ts = ramp(3);
        let err = ts.channel("absent").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn non_standard_layout_is_normalized() {
        let time = Array1::from_iter((0..4).map(f64::from));
        let mut ts = TimeSeries::new(time).unwrap();
        let transposed = Array2::from_shape_fn((2, 4), |(i, j)| (i * 4 + j) as f64).reversed_axes();
        ts.add_data("t", transposed.into_dyn()).unwrap();
        assert!(ts.channel("t").unwrap().is_standard_layout());
        assert_eq!(ts.channel("t").unwrap()[[1, 1]], 5.0);
    }
}
