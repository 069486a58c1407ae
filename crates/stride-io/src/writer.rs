//! CSV and JSON writers for detection and cycle analysis results.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use stride_cycles::Repeatability;
use stride_series::{Event, TimeSeries};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Writes pipeline results into an output directory.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_events.json`,
/// `{experiment}_normalized.csv` and `{experiment}_cycles.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Return the path a result file with the given suffix is written to.
    #[must_use]
    pub fn path_for(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(self.experiment.file_name(suffix))
    }

    /// Write the events of `ts`, sorted by time, to `{experiment}_events.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(events = ts.events().len()))]
    pub fn write_events(&self, ts: &TimeSeries) -> Result<PathBuf, IoError> {
        let path = self.path_for("events.json");

        let mut events: Vec<&Event> = ts.events().iter().collect();
        events.sort_by(|a, b| a.time_cmp(b));
        let mut counts: Vec<EventCount> = Vec::new();
        for event in &events {
            match counts.iter_mut().find(|c| c.name == event.name) {
                Some(count) => count.occurrences += 1,
                None => counts.push(EventCount {
                    name: &event.name,
                    occurrences: 1,
                }),
            }
        }

        let artifact = EventsArtifact {
            experiment: self.experiment.as_str(),
            n_samples: ts.len(),
            counts,
            events,
        };
        self.write_json(&path, &artifact)?;

        info!(path = %path.display(), "events written");
        Ok(path)
    }

    /// Write the samples of `ts` as a flat table to `{experiment}_normalized.csv`.
    ///
    /// Multi-dimensional channels use the bracket column convention and
    /// missing samples are written as `NaN`, so the file reads back with
    /// [`TimeSeriesReader`](crate::TimeSeriesReader).
    ///
    /// # Errors
    ///
    /// Returns [`IoError::CsvWrite`] if the file cannot be written.
    #[instrument(skip_all, fields(samples = ts.len()))]
    pub fn write_normalized(&self, ts: &TimeSeries) -> Result<PathBuf, IoError> {
        let path = self.path_for("normalized.csv");
        let csv_error = |e: csv::Error| IoError::CsvWrite {
            path: path.clone(),
            source: e,
        };

        let table = ts.to_table();
        let mut wtr = csv::Writer::from_path(&path).map_err(csv_error)?;
        wtr.write_record(table.names()).map_err(csv_error)?;
        for row in 0..table.n_rows() {
            wtr.write_record(table.columns.iter().map(|(_, values)| values[row].to_string()))
                .map_err(csv_error)?;
        }
        wtr.flush().map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), rows = table.n_rows(), "normalized table written");
        Ok(path)
    }

    /// Write a repeatability result to `{experiment}_cycles.json`.
    ///
    /// `cycle_bounds` holds the `(start, end)` time of every cycle of the
    /// ensemble the selection ran on, in cycle order.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(channel = channel, cycles = cycle_bounds.len()))]
    pub fn write_cycles(
        &self,
        channel: &str,
        n_points: usize,
        cycle_bounds: &[(f64, f64)],
        result: &Repeatability,
    ) -> Result<PathBuf, IoError> {
        let path = self.path_for("cycles.json");

        let cycles: Vec<CycleEntry> = cycle_bounds
            .iter()
            .enumerate()
            .map(|(index, &(start, end))| {
                let position = result.selected.iter().position(|&s| s == index);
                CycleEntry {
                    index,
                    start,
                    end,
                    duration: end - start,
                    selected: position.is_some(),
                    mean_dissimilarity: position
                        .map(|p| result.mean_dissimilarity[p])
                        .filter(|m| !m.is_nan()),
                }
            })
            .collect();

        let artifact = CyclesArtifact {
            experiment: self.experiment.as_str(),
            channel,
            n_cycles: cycle_bounds.len(),
            n_points,
            bound: Some(result.bound).filter(|b| !b.is_nan()),
            selected: &result.selected,
            rejected: &result.rejected,
            nan_cycles: &result.nan_cycles,
            cycles,
        };
        self.write_json(&path, &artifact)?;

        info!(
            path = %path.display(),
            selected = result.selected.len(),
            "cycle result written"
        );
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, path: &Path, artifact: &T) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(artifact).expect("serialization cannot fail");
        fs::write(path, &json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// Serialization artifacts
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EventsArtifact<'a> {
    experiment: &'a str,
    n_samples: usize,
    counts: Vec<EventCount<'a>>,
    events: Vec<&'a Event>,
}

#[derive(Serialize)]
struct EventCount<'a> {
    name: &'a str,
    occurrences: usize,
}

#[derive(Serialize)]
struct CyclesArtifact<'a> {
    experiment: &'a str,
    channel: &'a str,
    n_cycles: usize,
    n_points: usize,
    bound: Option<f64>,
    selected: &'a [usize],
    rejected: &'a [usize],
    nan_cycles: &'a [usize],
    cycles: Vec<CycleEntry>,
}

#[derive(Serialize)]
struct CycleEntry {
    index: usize,
    start: f64,
    end: f64,
    duration: f64,
    selected: bool,
    mean_dissimilarity: Option<f64>,
}
