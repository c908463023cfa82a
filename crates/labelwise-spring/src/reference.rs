//! Reference sequences to match and the matches reported for them.

use serde::{Deserialize, Serialize};

use labelwise_dtw::Sequence;

use crate::error::SpringError;

/// A sequence to look for in a stream, with its acceptance rules.
#[derive(Debug, Clone)]
pub struct SpringReference {
    series: Sequence,
    threshold: f64,
    min_len: usize,
    max_len: usize,
}

impl SpringReference {
    /// Create a reference that accepts matches of any length.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SpringError::InvalidThreshold`] | `threshold` is NaN or negative |
    pub fn new(series: Sequence, threshold: f64) -> Result<Self, SpringError> {
        Self::with_length_bounds(series, threshold, 1, usize::MAX)
    }

    /// Create a reference that only accepts matches spanning between
    /// `min_len` and `max_len` stream samples, inclusive.
    ///
    /// `threshold` may be `f64::INFINITY` to accept any cost.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SpringError::InvalidThreshold`] | `threshold` is NaN or negative |
    /// | [`SpringError::InvalidLengthBounds`] | `min_len > max_len` or `max_len == 0` |
    pub fn with_length_bounds(
        series: Sequence,
        threshold: f64,
        min_len: usize,
        max_len: usize,
    ) -> Result<Self, SpringError> {
        if threshold.is_nan() || threshold < 0.0 {
            return Err(SpringError::InvalidThreshold { threshold });
        }
        if min_len > max_len || max_len == 0 {
            return Err(SpringError::InvalidLengthBounds { min_len, max_len });
        }
        Ok(Self {
            series,
            threshold,
            min_len,
            max_len,
        })
    }

    /// Return the reference sequence.
    #[must_use]
    pub fn series(&self) -> &Sequence {
        &self.series
    }

    /// Return the largest accepted DTW cost.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Return the shortest accepted match length, in stream samples.
    #[must_use]
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Return the longest accepted match length, in stream samples.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Whether a match covering `len` stream samples passes the length window.
    pub(crate) fn accepts_len(&self, len: usize) -> bool {
        (self.min_len..=self.max_len).contains(&len)
    }
}

/// A reported subsequence match. Stream indices are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Position of the matched reference.
    pub reference_index: usize,
    /// DTW cost between the reference and the matched span.
    pub distance: f64,
    /// First stream index of the span.
    pub start_index: usize,
    /// Last stream index of the span.
    pub end_index: usize,
}

impl MatchResult {
    /// Number of stream samples the match covers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// Always false: a match covers at least one sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}
