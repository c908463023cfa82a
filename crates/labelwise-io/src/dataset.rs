//! Timestamped multivariate recordings and window resampling.

use tracing::instrument;

use labelwise_dtw::Sequence;

use crate::IoError;

/// Source of evenly spaced multivariate samples over a time window.
///
/// This is the only view the suggestion engine has of a dataset.
pub trait ResampleWindow {
    /// Number of values per sample.
    fn dimension(&self) -> usize;

    /// Resample the half-open window `[start, end)` into exactly `count`
    /// samples; sample `k` is taken at `start + k * (end - start) / count`.
    ///
    /// # Errors
    ///
    /// Implementations return [`IoError::InvalidWindow`] when `count` is
    /// zero or the window is empty or non-finite.
    fn resample_window(&self, start: f64, end: f64, count: usize) -> Result<Sequence, IoError>;
}

/// A recording: strictly increasing timestamps (seconds) with one
/// multivariate row each. NaN values mark missing readings.
#[derive(Debug, Clone)]
pub struct SensorDataset {
    column_names: Vec<String>,
    timestamps: Vec<f64>,
    values: Vec<f64>,
    dim: usize,
}

impl SensorDataset {
    /// Build a dataset from timestamps and rows of equal length.
    ///
    /// Column names default to `x0, x1, ...`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Sequence`] | No rows, zero-width rows or an infinite value |
    /// | [`IoError::RowDimensionMismatch`] | Rows differ in length, or `timestamps` and `rows` differ in count |
    /// | [`IoError::UnorderedTimestamps`] | A timestamp is non-finite or not greater than its predecessor |
    pub fn new(timestamps: Vec<f64>, rows: Vec<Vec<f64>>) -> Result<Self, IoError> {
        if timestamps.len() != rows.len() {
            return Err(IoError::RowDimensionMismatch {
                row_index: timestamps.len().min(rows.len()),
                expected: timestamps.len(),
                got: rows.len(),
            });
        }
        let dim = rows.first().map_or(0, Vec::len);
        let column_names = (0..dim).map(|d| format!("x{d}")).collect();
        Self::with_columns(column_names, timestamps, rows)
    }

    /// Build a dataset with explicit column names.
    ///
    /// # Errors
    ///
    /// See [`SensorDataset::new`]. The column count must equal the row width.
    pub fn with_columns(
        column_names: Vec<String>,
        timestamps: Vec<f64>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, IoError> {
        for (row_index, pair) in timestamps.windows(2).enumerate() {
            if !(pair[1] > pair[0]) {
                return Err(IoError::UnorderedTimestamps {
                    row_index: row_index + 1,
                });
            }
        }
        if let Some(row_index) = timestamps.iter().position(|t| !t.is_finite()) {
            return Err(IoError::UnorderedTimestamps { row_index });
        }
        let dim = column_names.len();
        if let Some((row_index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(IoError::RowDimensionMismatch {
                row_index,
                expected: dim,
                got: row.len(),
            });
        }

        // Validates non-empty, non-zero width and finiteness.
        let sequence = Sequence::from_rows(rows)?;

        Ok(Self {
            column_names,
            timestamps,
            values: sequence.into_flat(),
            dim,
        })
    }

    /// Return the column names, one per dimension.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Return the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Always false: construction rejects empty datasets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Return the timestamps.
    #[must_use]
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Return the first and last timestamp.
    #[must_use]
    pub fn time_range(&self) -> (f64, f64) {
        (self.timestamps[0], self.timestamps[self.timestamps.len() - 1])
    }

    /// Return row `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }

    /// Linearly interpolate every dimension at time `t` into `out`.
    ///
    /// Times outside the recording clamp to the first or last row. A
    /// dimension missing at either neighbouring row stays missing unless
    /// `t` falls exactly on the other row.
    pub fn interpolate_into(&self, t: f64, out: &mut [f64]) {
        let n = self.timestamps.len();
        // First index with timestamp > t.
        let upper = self.timestamps.partition_point(|&ts| ts <= t);
        if upper == 0 {
            out.copy_from_slice(self.row(0));
            return;
        }
        if upper == n {
            out.copy_from_slice(self.row(n - 1));
            return;
        }
        let lower = upper - 1;
        let (t0, t1) = (self.timestamps[lower], self.timestamps[upper]);
        let w = (t - t0) / (t1 - t0);
        let (a, b) = (self.row(lower), self.row(upper));
        for (slot, (&va, &vb)) in out.iter_mut().zip(a.iter().zip(b)) {
            *slot = if w == 0.0 { va } else { va + w * (vb - va) };
        }
    }
}

impl ResampleWindow for SensorDataset {
    fn dimension(&self) -> usize {
        self.dim
    }

    #[instrument(level = "trace", skip(self))]
    fn resample_window(&self, start: f64, end: f64, count: usize) -> Result<Sequence, IoError> {
        if count == 0 || !start.is_finite() || !end.is_finite() || end <= start {
            return Err(IoError::InvalidWindow { start, end, count });
        }
        let step = (end - start) / count as f64;
        let mut values = vec![0.0; count * self.dim];
        for (k, out) in values.chunks_exact_mut(self.dim).enumerate() {
            self.interpolate_into(start + k as f64 * step, out);
        }
        Ok(Sequence::new(values, self.dim)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> SensorDataset {
        // x0 = t, x1 = 10 - t, sampled at t = 0, 1, 2, 3
        SensorDataset::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![vec![0.0, 10.0], vec![1.0, 9.0], vec![2.0, 8.0], vec![3.0, 7.0]],
        )
        .unwrap()
    }

    #[test]
    fn resample_uses_half_open_grid() {
        let seq = ramp().resample_window(0.0, 2.0, 4).unwrap();
        assert_eq!(seq.len(), 4);
        let x0: Vec<f64> = seq.samples().map(|s| s[0]).collect();
        assert_eq!(x0, vec![0.0, 0.5, 1.0, 1.5]);
        assert!((seq[3][1] - 8.5).abs() < 1e-12);
    }

    #[test]
    fn resample_clamps_outside_recording() {
        let seq = ramp().resample_window(-2.0, 6.0, 4).unwrap();
        let x0: Vec<f64> = seq.samples().map(|s| s[0]).collect();
        assert_eq!(x0, vec![0.0, 0.0, 2.0, 3.0]);
    }

    #[test]
    fn missing_values_propagate() {
        let ds = SensorDataset::new(
            vec![0.0, 1.0, 2.0],
            vec![vec![0.0, 1.0], vec![f64::NAN, 2.0], vec![4.0, 3.0]],
        )
        .unwrap();
        let mut out = [0.0; 2];
        ds.interpolate_into(0.5, &mut out);
        assert!(out[0].is_nan());
        assert!((out[1] - 1.5).abs() < 1e-12);
        ds.interpolate_into(2.0, &mut out);
        assert_eq!(out, [4.0, 3.0]);
    }

    #[test]
    fn rejects_bad_windows() {
        let ds = ramp();
        assert!(matches!(ds.resample_window(1.0, 1.0, 3), Err(IoError::InvalidWindow { .. })));
        assert!(matches!(ds.resample_window(0.0, 1.0, 0), Err(IoError::InvalidWindow { .. })));
        assert!(matches!(
            ds.resample_window(0.0, f64::NAN, 2),
            Err(IoError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn rejects_unordered_timestamps() {
        let err = SensorDataset::new(vec![0.0, 2.0, 1.0], vec![vec![0.0]; 3]).unwrap_err();
        assert!(matches!(err, IoError::UnorderedTimestamps { row_index: 2 }));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = SensorDataset::new(vec![0.0, 1.0], vec![vec![0.0, 1.0], vec![0.0]]).unwrap_err();
        assert!(matches!(err, IoError::RowDimensionMismatch { row_index: 1, expected: 2, got: 1 }));
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(SensorDataset::new(Vec::new(), Vec::new()), Err(IoError::Sequence(_))));
    }
}
