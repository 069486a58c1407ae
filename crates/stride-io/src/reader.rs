//! CSV time series reader with cell-level validation.

use std::path::{Path, PathBuf};

use stride_series::{TIME_COLUMN, Table, TimeSeries};
use tracing::{debug, info, instrument};

use crate::IoError;

/// Reads a time series from a CSV table.
///
/// Expected CSV format:
/// - Header row required
/// - A time column (`Time` unless configured otherwise)
/// - One column per scalar channel, or one column per component of a
///   multi-dimensional channel using the bracket convention
///   (`Forces[0]`, `Forces[1]`, `Rotation[0,2]`)
/// - Empty cells and `NaN` read as missing samples
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::InvalidCell`] | Cell is not a number, `NaN` or empty |
/// | [`IoError::Table`] | Missing time column, invalid time vector or bad channel labels |
pub struct TimeSeriesReader {
    path: PathBuf,
    time_column: String,
}

impl TimeSeriesReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            time_column: TIME_COLUMN.to_string(),
        }
    }

    /// Use a different time column header.
    #[must_use]
    pub fn with_time_column(mut self, name: impl Into<String>) -> Self {
        self.time_column = name.into();
        self
    }

    /// Read the CSV file into a column table without interpreting the headers.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_table(&self) -> Result<Table, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets ragged rows reach the InconsistentRowLength check
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected = header.len();
        debug!(expected, "read CSV header");

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); expected];
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected,
                    got: record.len(),
                });
            }
            for (col_index, raw) in record.iter().enumerate() {
                let value = parse_cell(raw).ok_or_else(|| IoError::InvalidCell {
                    path: self.path.clone(),
                    row_index,
                    column: header[col_index].to_string(),
                    raw: raw.to_string(),
                })?;
                columns[col_index].push(value);
            }
        }

        let mut table = Table::new();
        for (name, values) in header.iter().zip(columns) {
            table.push_column(name, values);
        }
        Ok(table)
    }

    /// Read and validate the CSV file, returning a [`TimeSeries`].
    ///
    /// Events and metadata are not stored in the table; the series gets the
    /// default time metadata and no events.
    #[instrument(skip(self), fields(path = %self.path.display(), time_column = %self.time_column))]
    pub fn read(&self) -> Result<TimeSeries, IoError> {
        let table = self.read_table()?;
        let ts = TimeSeries::from_table(&table, &self.time_column).map_err(|e| IoError::Table {
            path: self.path.clone(),
            source: e,
        })?;
        info!(
            samples = ts.len(),
            channels = ts.data().len(),
            "time series loaded"
        );
        Ok(ts)
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

/// Parse one cell. Empty cells and any spelling of `NaN` are missing samples.
fn parse_cell(raw: &str) -> Option<f64> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use stride_series::SeriesError;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_scalar_and_vector_channels() {
        let csv = "Time,F,COP[0],COP[1]\n0.0,1.0,0.1,0.2\n0.5,2.0,0.3,0.4\n1.0,3.0,0.5,0.6\n";
        let f = write_csv(csv);
        let ts = TimeSeriesReader::new(f.path()).read().unwrap();
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.time().to_vec(), vec![0.0, 0.5, 1.0]);
        assert_eq!(ts.channel("F").unwrap().shape(), &[3]);
        let cop = ts.channel("COP").unwrap();
        assert_eq!(cop.shape(), &[3, 2]);
        assert_eq!(cop[[2, 1]], 0.6);
    }

    #[test]
    fn empty_and_nan_cells_are_missing() {
        let csv = "Time,F\n0.0,\n0.1,NaN\n0.2,nan\n0.3,4.5\n";
        let f = write_csv(csv);
        let ts = TimeSeriesReader::new(f.path()).read().unwrap();
        assert_eq!(ts.isnan("F").unwrap(), vec![true, true, true, false]);
    }

    #[test]
    fn custom_time_column() {
        let csv = "t,F\n0.0,1.0\n1.0,2.0\n";
        let f = write_csv(csv);
        let ts = TimeSeriesReader::new(f.path())
            .with_time_column("t")
            .read()
            .unwrap();
        assert_eq!(ts.len(), 2);
        assert!(ts.contains_channel("F"));
        assert!(!ts.contains_channel("t"));
    }

    #[test]
    fn header_only_gives_empty_series() {
        let f = write_csv("Time,F\n");
        let ts = TimeSeriesReader::new(f.path()).read().unwrap();
        assert!(ts.is_empty());
        assert_eq!(ts.channel("F").unwrap().len(), 0);
    }

    #[test]
    fn missing_file() {
        let err = TimeSeriesReader::new(Path::new("/nonexistent/walk.csv"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }

    #[test]
    fn ragged_row() {
        let f = write_csv("Time,F\n0.0,1.0\n0.1\n");
        let err = TimeSeriesReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength { row_index: 1, expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn unparseable_cell() {
        let f = write_csv("Time,F\n0.0,1.0\n0.1,abc\n");
        let err = TimeSeriesReader::new(f.path()).read().unwrap_err();
        match err {
            IoError::InvalidCell { row_index, column, raw, .. } => {
                assert_eq!(row_index, 1);
                assert_eq!(column, "F");
                assert_eq!(raw, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_time_column() {
        let f = write_csv("Seconds,F\n0.0,1.0\n");
        let err = TimeSeriesReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::Table { source: SeriesError::MalformedTable { .. }, .. }
        ));
    }

    #[test]
    fn decreasing_time_is_rejected() {
        let f = write_csv("Time,F\n1.0,1.0\n0.5,2.0\n");
        let err = TimeSeriesReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::Table { source: SeriesError::DecreasingTime { .. }, .. }
        ));
    }

    #[test]
    fn read_table_keeps_column_order() {
        let f = write_csv("Time,B,A\n0.0,1.0,2.0\n");
        let table = TimeSeriesReader::new(f.path()).read_table().unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["Time", "B", "A"]);
        assert_eq!(table.n_rows(), 1);
    }
}
