//! Pairwise cycle dissimilarities in a lower-triangular matrix.

/// Mean squared difference over the positions finite in both cycles.
///
/// Returns NaN when no position is finite in both.
#[must_use]
pub fn mean_squared_difference(a: &[f64], b: &[f64]) -> f64 {
    let (sum, count) = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .fold((0.0, 0usize), |(sum, count), (x, y)| {
            (sum + (x - y).powi(2), count + 1)
        });
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Symmetric dissimilarity matrix stored as a lower-triangular flat vector.
///
/// For `n` cycles, stores `n*(n-1)/2` values. Access is symmetric:
/// `get(i, j) == get(j, i)`. The diagonal is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct DissimilarityMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DissimilarityMatrix {
    /// Compute every pairwise [`mean_squared_difference`] of `cycles`.
    #[must_use]
    pub fn from_cycles(cycles: &[Vec<f64>]) -> Self {
        let n = cycles.len();
        let mut data = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 1..n {
            for j in 0..i {
                data.push(mean_squared_difference(&cycles[i], &cycles[j]));
            }
        }
        Self { n, data }
    }

    /// Return the number of cycles in the matrix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Return true if the matrix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Return the dissimilarity between cycles `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n` or `j >= n`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n, "row index {i} out of bounds for matrix of size {}", self.n);
        assert!(j < self.n, "column index {j} out of bounds for matrix of size {}", self.n);
        if i == j {
            return 0.0;
        }
        let (row, col) = if i > j { (i, j) } else { (j, i) };
        self.data[row * (row - 1) / 2 + col]
    }

    /// Mean dissimilarity of `i` to the other members of `set`, ignoring NaN
    /// pairs. NaN when `i` has no comparable partner in `set`.
    #[must_use]
    pub fn mean_to(&self, i: usize, set: &[usize]) -> f64 {
        let (sum, count) = set
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| self.get(i, j))
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }
}
