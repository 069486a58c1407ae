//! Conversion between a series and a flat table of named columns.
//!
//! Multi-dimensional channels are flattened row-major into one column per
//! component, named with the bracket convention: `Forces[0]`, `Forces[1]`,
//! `Rotation[0,2]`. A one-dimensional channel keeps its bare name.

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayD, IxDyn};

use crate::error::SeriesError;
use crate::series::{Channels, TimeSeries, TimeSeriesParts};

/// Name of the time column written by [`TimeSeries::to_table`].
pub const TIME_COLUMN: &str = "Time";

/// Column-oriented table of `f64` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Columns in order, each a name and its values.
    pub columns: Vec<(String, Vec<f64>)>,
}

impl Table {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.columns.push((name.into(), values));
    }

    /// Return a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Return the column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Return the number of rows (length of the first column).
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, v)| v.len())
    }
}

impl TimeSeries {
    /// Flatten the series into a table whose first column is [`TIME_COLUMN`].
    ///
    /// Events and metadata are not part of the table.
    #[must_use]
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.push_column(TIME_COLUMN, self.time.to_vec());
        for (name, array) in &self.data {
            let shape = array.shape();
            if shape.len() == 1 {
                table.push_column(name.clone(), array.iter().copied().collect());
                continue;
            }
            let inner = &shape[1..];
            let width: usize = inner.iter().product();
            let flat: Vec<f64> = array.iter().copied().collect();
            for col in 0..width {
                let index = unravel(col, inner);
                let label = index
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                let values = (0..self.len()).map(|row| flat[row * width + col]).collect();
                table.push_column(format!("{name}[{label}]"), values);
            }
        }
        table
    }

    /// Rebuild a series from a table, the inverse of [`TimeSeries::to_table`].
    ///
    /// `time_column` names the time column, usually [`TIME_COLUMN`].
    /// Bracketed columns sharing a name are regrouped into one channel whose
    /// shape is `max index + 1` along each axis; every component of that
    /// shape must be present exactly once.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::MalformedTable`] | Missing time column, ragged columns, bad bracket suffix or incomplete component grid |
    /// | [`SeriesError::NonFiniteTime`] / [`SeriesError::DecreasingTime`] | The time column is not a valid time vector |
    pub fn from_table(table: &Table, time_column: &str) -> Result<Self, SeriesError> {
        let time = table.column(time_column).ok_or_else(|| SeriesError::MalformedTable {
            reason: format!("no \"{time_column}\" column"),
        })?;
        let n = time.len();

        let mut groups: BTreeMap<String, Vec<(Vec<usize>, &[f64])>> = BTreeMap::new();
        for (label, values) in &table.columns {
            if label == time_column {
                continue;
            }
            if values.len() != n {
                return Err(malformed(format!(
                    "column \"{label}\" has {} rows, expected {n}",
                    values.len()
                )));
            }
            let (base, index) = parse_label(label)?;
            groups.entry(base).or_default().push((index, values.as_slice()));
        }

        let mut data = Channels::new();
        for (name, columns) in groups {
            let array = regroup(&name, &columns, n)?;
            data.insert(name, array);
        }
        Self::from_parts(TimeSeriesParts {
            time: Array1::from(time.to_vec()),
            data,
            ..TimeSeriesParts::default()
        })
    }
}

fn malformed(reason: String) -> SeriesError {
    SeriesError::MalformedTable { reason }
}

/// Split `Name[i,j]` into `("Name", [i, j])`; a bare name has no index.
fn parse_label(label: &str) -> Result<(String, Vec<usize>), SeriesError> {
    let Some(open) = label.find('[') else {
        return Ok((label.to_string(), Vec::new()));
    };
    let inner = label[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| malformed(format!("column \"{label}\" has an unclosed bracket")))?;
    let index = inner
        .split(',')
        .map(|part| part.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed(format!("column \"{label}\" has a non-integer index")))?;
    Ok((label[..open].to_string(), index))
}

fn regroup(name: &str, columns: &[(Vec<usize>, &[f64])], n: usize) -> Result<ArrayD<f64>, SeriesError> {
    if let [(index, values)] = columns
        && index.is_empty()
    {
        return Ok(Array1::from(values.to_vec()).into_dyn());
    }
    let rank = columns[0].0.len();
    if rank == 0 || columns.iter().any(|(index, _)| index.len() != rank) {
        return Err(malformed(format!(
            "columns of \"{name}\" mix bracket arities"
        )));
    }
    let too_large = || malformed(format!("channel \"{name}\" has an index too large to address"));
    let mut inner = vec![0; rank];
    for (index, _) in columns {
        for (dim, &i) in inner.iter_mut().zip(index) {
            *dim = (*dim).max(i.checked_add(1).ok_or_else(too_large)?);
        }
    }
    let width = inner
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(too_large)?;
    if width != columns.len() {
        return Err(malformed(format!(
            "channel \"{name}\" has {} columns, its shape {inner:?} needs {width}",
            columns.len()
        )));
    }

    let mut seen = vec![false; width];
    let mut flat = vec![0.0; n * width];
    for (index, values) in columns {
        let col = ravel(index, &inner);
        if std::mem::replace(&mut seen[col], true) {
            return Err(malformed(format!("channel \"{name}\" repeats index {index:?}")));
        }
        for (row, &v) in values.iter().enumerate() {
            flat[row * width + col] = v;
        }
    }
    let mut shape = vec![n];
    shape.extend(&inner);
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), flat).expect("flat length matches shape"))
}

fn ravel(index: &[usize], dims: &[usize]) -> usize {
    index.iter().zip(dims).fold(0, |acc, (&i, &d)| acc * d + i)
}

fn unravel(mut flat: usize, dims: &[usize]) -> Vec<usize> {
    let mut index = vec![0; dims.len()];
    for (slot, &d) in index.iter_mut().zip(dims).rev() {
        *slot = flat % d;
        flat /= d;
    }
    index
}

#[cfg(test)]
mod tests {
    use ndarray::{Array3, array};

    use super::*;

    fn sample() -> TimeSeries {
        let mut ts = TimeSeries::new(array![0.0, 0.5, 1.0]).unwrap();
        ts.add_data("Forces", array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]].into_dyn())
            .unwrap();
        ts.add_data("Angle", array![10.0, 20.0, 30.0].into_dyn()).unwrap();
        ts
    }

    #[test]
    fn column_naming() {
        let table = sample().to_table();
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, ["Time", "Angle", "Forces[0]", "Forces[1]"]);
        assert_eq!(table.column("Forces[1]").unwrap(), &[2.0, 4.0, 6.0]);
        assert_eq!(table.n_rows(), 3);
    }

    #[test]
    fn matrix_channel_round_trip() {
        let mut ts = TimeSeries::new(array![0.0, 1.0]).unwrap();
        let rot = Array3::from_shape_fn((2, 2, 3), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        ts.add_data("Rot", rot.into_dyn()).unwrap();
        let table = ts.to_table();
        assert_eq!(table.column("Rot[1,2]").unwrap(), &[12.0, 112.0]);

        let back = TimeSeries::from_table(&table, TIME_COLUMN).unwrap();
        assert_eq!(back.channel("Rot").unwrap(), ts.channel("Rot").unwrap());
    }

    #[test]
    fn from_table_regroups_columns() {
        let back = TimeSeries::from_table(&sample().to_table(), TIME_COLUMN).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn missing_time_column() {
        let mut table = Table::new();
        table.push_column("x", vec![1.0]);
        let err = TimeSeries::from_table(&table, TIME_COLUMN).unwrap_err();
        assert!(matches!(err, SeriesError::MalformedTable { .. }));
    }

    #[test]
    fn incomplete_grid_is_rejected() {
        let mut table = Table::new();
        table.push_column("Time", vec![0.0]);
        table.push_column("F[0]", vec![1.0]);
        table.push_column("F[2]", vec![1.0]);
        assert!(TimeSeries::from_table(&table, "Time").is_err());
    }

    #[test]
    fn oversized_index_is_rejected() {
        let mut table = Table::new();
        table.push_column("Time", vec![0.0]);
        table.push_column(format!("F[{}]", usize::MAX), vec![1.0]);
        assert!(matches!(
            TimeSeries::from_table(&table, "Time"),
            Err(SeriesError::MalformedTable { .. })
        ));

        let mut table = Table::new();
        table.push_column("Time", vec![0.0]);
        table.push_column(format!("F[{},{}]", usize::MAX / 2, usize::MAX / 2), vec![1.0]);
        assert!(matches!(
            TimeSeries::from_table(&table, "Time"),
            Err(SeriesError::MalformedTable { .. })
        ));
    }

    #[test]
    fn bad_labels_are_rejected() {
        assert!(parse_label("F[a]").is_err());
        assert!(parse_label("F[1").is_err());
        assert_eq!(parse_label("F[1, 2]").unwrap(), ("F".to_string(), vec![1, 2]));
        assert_eq!(parse_label("F").unwrap(), ("F".to_string(), vec![]));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let mut table = Table::new();
        table.push_column("Time", vec![0.0, 1.0]);
        table.push_column("x", vec![1.0]);
        assert!(TimeSeries::from_table(&table, "Time").is_err());
    }

    #[test]
    fn ravel_and_unravel_agree() {
        let dims = [2, 3, 4];
        for flat in 0..24 {
            assert_eq!(ravel(&unravel(flat, &dims), &dims), flat);
        }
    }
}
