//! Multivariate sequence types with validation guarantees.

use std::ops::Index;

use crate::error::DtwError;

/// Owned, validated multivariate sequence.
///
/// Samples are stored row-major in one flat buffer. Guaranteed non-empty, with
/// a non-zero dimension shared by every sample and no infinite values. NaN is
/// allowed and marks a missing dimension.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "SerdeRows", into = "SerdeRows")]
pub struct Sequence {
    values: Vec<f64>,
    dim: usize,
}

impl Sequence {
    /// Create a sequence from a flat row-major buffer of samples of dimension `dim`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::ZeroDimension`] | `dim` is zero |
    /// | [`DtwError::EmptySequence`] | `values` is empty |
    /// | [`DtwError::RaggedBuffer`] | `values.len()` is not a multiple of `dim` |
    /// | [`DtwError::InfiniteValue`] | Any value is infinite |
    pub fn new(values: Vec<f64>, dim: usize) -> Result<Self, DtwError> {
        validate(&values, dim)?;
        Ok(Self { values, dim })
    }

    /// Create a sequence from one vector per sample.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::EmptySequence`] | `rows` is empty |
    /// | [`DtwError::ZeroDimension`] | The first sample is empty |
    /// | [`DtwError::DimensionMismatch`] | A sample's length differs from the first |
    /// | [`DtwError::InfiniteValue`] | Any value is infinite |
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, DtwError> {
        let dim = rows.first().ok_or(DtwError::EmptySequence)?.len();
        if dim == 0 {
            return Err(DtwError::ZeroDimension);
        }
        let mut values = Vec::with_capacity(rows.len() * dim);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(DtwError::DimensionMismatch { index, expected: dim, got: row.len() });
            }
            values.extend(row);
        }
        Self::new(values, dim)
    }

    /// Create a one-dimensional sequence from scalar values.
    ///
    /// # Errors
    ///
    /// Same as [`Sequence::new`] with `dim = 1`.
    pub fn univariate(values: Vec<f64>) -> Result<Self, DtwError> {
        Self::new(values, 1)
    }

    /// Borrow this sequence as a zero-copy view.
    #[must_use]
    pub fn as_view(&self) -> SequenceView<'_> {
        SequenceView::new_unchecked(&self.values, self.dim)
    }

    /// Return the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() / self.dim
    }

    /// Return true if the sequence has no samples.
    ///
    /// Always `false` for a [`Sequence`] built through its constructors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return the dimension shared by every sample.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return the sample at position `index`.
    #[must_use]
    pub fn sample(&self, index: usize) -> &[f64] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }

    /// Iterate over the samples in order.
    pub fn samples(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.dim)
    }

    /// Return the flat row-major buffer.
    #[must_use]
    pub fn as_flat(&self) -> &[f64] {
        &self.values
    }

    /// Consume and return the flat row-major buffer.
    #[must_use]
    pub fn into_flat(self) -> Vec<f64> {
        self.values
    }

    /// Return the samples as nested vectors.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.samples().map(<[f64]>::to_vec).collect()
    }
}

impl Index<usize> for Sequence {
    type Output = [f64];

    fn index(&self, index: usize) -> &Self::Output {
        self.sample(index)
    }
}

impl TryFrom<Vec<Vec<f64>>> for Sequence {
    type Error = DtwError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Sequence> for Vec<Vec<f64>> {
    fn from(sequence: Sequence) -> Self {
        sequence.to_rows()
    }
}

/// Serde form of a sequence: one array per sample, missing values as `null`.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
struct SerdeRows(Vec<Vec<Option<f64>>>);

impl TryFrom<SerdeRows> for Sequence {
    type Error = DtwError;

    fn try_from(rows: SerdeRows) -> Result<Self, Self::Error> {
        Self::from_rows(
            rows.0
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
                .collect(),
        )
    }
}

impl From<Sequence> for SerdeRows {
    fn from(sequence: Sequence) -> Self {
        Self(
            sequence
                .samples()
                .map(|row| row.iter().map(|&v| (!v.is_nan()).then_some(v)).collect())
                .collect(),
        )
    }
}

/// Borrowed, validated view into a sequence. Zero-copy reference.
#[derive(Debug, Clone, Copy)]
pub struct SequenceView<'a> {
    values: &'a [f64],
    dim: usize,
}

impl<'a> SequenceView<'a> {
    /// Create a view over a flat row-major buffer, validating it like [`Sequence::new`].
    ///
    /// # Errors
    ///
    /// Same as [`Sequence::new`].
    pub fn new(values: &'a [f64], dim: usize) -> Result<Self, DtwError> {
        validate(values, dim)?;
        Ok(Self { values, dim })
    }

    /// Create a view without validation. For internal use where data is already validated.
    pub(crate) fn new_unchecked(values: &'a [f64], dim: usize) -> Self {
        Self { values, dim }
    }

    /// Return the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() / self.dim
    }

    /// Return true if the view has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return the sample dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return the sample at position `index`.
    #[must_use]
    pub fn sample(&self, index: usize) -> &'a [f64] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }

    /// Iterate over the samples in order.
    pub fn samples(&self) -> impl ExactSizeIterator<Item = &'a [f64]> + 'a {
        self.values.chunks_exact(self.dim)
    }

    /// Return the flat row-major buffer.
    #[must_use]
    pub fn as_flat(&self) -> &'a [f64] {
        self.values
    }

    /// Copy the viewed samples into an owned [`Sequence`].
    #[must_use]
    pub fn to_owned(&self) -> Sequence {
        Sequence { values: self.values.to_vec(), dim: self.dim }
    }
}

impl Index<usize> for SequenceView<'_> {
    type Output = [f64];

    fn index(&self, index: usize) -> &Self::Output {
        self.sample(index)
    }
}

fn validate(values: &[f64], dim: usize) -> Result<(), DtwError> {
    if dim == 0 {
        return Err(DtwError::ZeroDimension);
    }
    if values.is_empty() {
        return Err(DtwError::EmptySequence);
    }
    if values.len() % dim != 0 {
        return Err(DtwError::RaggedBuffer { len: values.len(), dim });
    }
    if let Some(flat) = values.iter().position(|v| v.is_infinite()) {
        return Err(DtwError::InfiniteValue { sample: flat / dim, dimension: flat % dim });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_rows() {
        let result = Sequence::from_rows(vec![]);
        assert!(matches!(result, Err(DtwError::EmptySequence)));
    }

    #[test]
    fn rejects_zero_dimension() {
        let result = Sequence::from_rows(vec![vec![], vec![]]);
        assert!(matches!(result, Err(DtwError::ZeroDimension)));
    }

    #[test]
    fn rejects_ragged_rows() {
        let result = Sequence::from_rows(vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(
            result,
            Err(DtwError::DimensionMismatch { index: 1, expected: 2, got: 1 })
        ));
    }

    #[test]
    fn rejects_ragged_flat_buffer() {
        let result = Sequence::new(vec![1.0, 2.0, 3.0], 2);
        assert!(matches!(result, Err(DtwError::RaggedBuffer { len: 3, dim: 2 })));
    }

    #[test]
    fn rejects_infinity() {
        let result = Sequence::new(vec![1.0, 2.0, 3.0, f64::NEG_INFINITY], 2);
        assert!(matches!(result, Err(DtwError::InfiniteValue { sample: 1, dimension: 1 })));
    }

    #[test]
    fn accepts_nan_as_missing() {
        let seq = Sequence::new(vec![1.0, f64::NAN, 3.0, 4.0], 2).unwrap();
        assert_eq!(seq.len(), 2);
        assert!(seq[0][1].is_nan());
    }

    #[test]
    fn sample_access() {
        let seq = Sequence::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.dim(), 2);
        assert_eq!(seq.sample(1), &[3.0, 4.0]);
        assert_eq!(seq.samples().count(), 3);
    }

    #[test]
    fn view_matches_owner() {
        let seq = Sequence::univariate(vec![1.0, 2.0, 3.0]).unwrap();
        let view = seq.as_view();
        assert_eq!(view.len(), 3);
        assert_eq!(view[2], [3.0]);
        assert_eq!(view.to_owned(), seq);
    }

    #[test]
    fn view_rejects_empty() {
        let result = SequenceView::new(&[], 1);
        assert!(matches!(result, Err(DtwError::EmptySequence)));
    }

    #[test]
    fn rows_roundtrip_through_serde() {
        let seq = Sequence::from_rows(vec![vec![0.5, 1.0], vec![1.5, 2.0]]).unwrap();
        let json = serde_json::to_string(&seq).unwrap();
        assert_eq!(json, "[[0.5,1.0],[1.5,2.0]]");
        let back: Sequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seq);
    }

    #[test]
    fn missing_values_serialize_as_null() {
        let seq = Sequence::from_rows(vec![vec![f64::NAN, 1.0]]).unwrap();
        let json = serde_json::to_string(&seq).unwrap();
        assert_eq!(json, "[[null,1.0]]");
        let back: Sequence = serde_json::from_str(&json).unwrap();
        assert!(back[0][0].is_nan());
        assert_eq!(back[0][1], 1.0);
    }

    #[test]
    fn deserialize_rejects_empty() {
        let result: Result<Sequence, _> = serde_json::from_str("[]");
        assert!(result.is_err());
    }
}
