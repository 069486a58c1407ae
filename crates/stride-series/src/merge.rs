//! Combining the channels and events of two series.

use tracing::{info, instrument};

use crate::error::SeriesError;
use crate::interp::Interpolation;
use crate::resample::ResampleOptions;
use crate::series::TimeSeries;

/// Options for [`TimeSeries::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Replace channels that exist in both series. Default: false.
    pub overwrite: bool,
    /// Merge only these channels of the other series. Default: all.
    pub channels: Option<Vec<String>>,
    /// Resample the other series onto this one's time when the time vectors
    /// differ. Default: `None`, differing time vectors are an error.
    pub resample: Option<Interpolation>,
}

impl MergeOptions {
    /// No overwrite, all channels, no resampling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether colliding channels are replaced.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Restrict the merge to these channels of the other series.
    #[must_use]
    pub fn with_channels<S: Into<String>>(mut self, channels: impl IntoIterator<Item = S>) -> Self {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    /// Resample the other series with this method when time vectors differ.
    #[must_use]
    pub fn with_resample(mut self, kind: Interpolation) -> Self {
        self.resample = Some(kind);
        self
    }
}

impl TimeSeries {
    /// Return a copy of `self` with the channels and events of `other`.
    ///
    /// Channel metadata of merged channels is merged too, `other`'s entries
    /// winning. Events of `other` are added as unique events and the
    /// result's events are sorted. A series with no samples and no channels
    /// adopts `other`'s time vector. Nothing is merged if any check fails.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::ChannelNotFound`] | A requested channel is not in `other` |
    /// | [`SeriesError::TimeMismatch`] | Time vectors differ and resampling is disabled |
    /// | [`SeriesError::MergeConflict`] | A channel exists in both and overwrite is disabled |
    #[instrument(skip(self, other, options), fields(channels = other.data.len(), overwrite = options.overwrite))]
    pub fn merge(&self, other: &Self, options: &MergeOptions) -> Result<Self, SeriesError> {
        let names: Vec<String> = match &options.channels {
            Some(names) => names.clone(),
            None => other.data.keys().cloned().collect(),
        };
        let mut source = other.get_subset(&names)?;

        let mut out = self.clone();
        if out.is_empty() && out.data.is_empty() {
            out.time = other.time.clone();
        }
        if out.time != source.time {
            let Some(kind) = options.resample else {
                return Err(SeriesError::TimeMismatch {
                    self_len: out.len(),
                    other_len: source.len(),
                });
            };
            source = source.resample(
                &out.time,
                ResampleOptions::new().with_kind(kind).with_extrapolate(true),
            )?;
        }
        if !options.overwrite
            && let Some(name) = names.iter().find(|n| out.data.contains_key(n.as_str()))
        {
            return Err(SeriesError::MergeConflict {
                channel: name.clone(),
            });
        }

        for (name, array) in source.data {
            out.data.insert(name, array);
        }
        for (name, info) in source.data_info {
            out.data_info.entry(name).or_default().extend(info);
        }
        for event in &other.events {
            out.add_unique_event(event.time, event.name.clone());
        }
        out.sort_events();
        info!(merged = names.len(), "merged series");
        Ok(out)
    }
}
