//! Lower-triangular matrix of pairwise DTW costs.

use crate::distance::DtwDistance;

/// Symmetric cost matrix stored as a lower-triangular flat vector.
///
/// For `n` sequences, stores `n*(n-1)/2` costs. Access is symmetric and the
/// diagonal is zero.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<DtwDistance>,
}

impl DistanceMatrix {
    /// `data[row*(row-1)/2 + col]` holds the cost for `row > col`.
    pub(crate) fn from_raw(n: usize, data: Vec<DtwDistance>) -> Self {
        debug_assert_eq!(data.len(), n * n.saturating_sub(1) / 2);
        Self { n, data }
    }

    /// Return the number of sequences in the matrix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Return true if the matrix covers no sequences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Return the cost between sequence `i` and sequence `j`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n` or `j >= n`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> DtwDistance {
        assert!(i < self.n && j < self.n, "index ({i}, {j}) out of bounds for {}", self.n);
        if i == j {
            return DtwDistance::ZERO;
        }
        let (row, col) = if i > j { (i, j) } else { (j, i) };
        self.data[row * (row - 1) / 2 + col]
    }

    /// Return the costs from sequence `i` to every sequence, including itself.
    #[must_use]
    pub fn row(&self, i: usize) -> Vec<DtwDistance> {
        (0..self.n).map(|j| self.get(i, j)).collect()
    }
}
