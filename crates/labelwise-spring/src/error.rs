/// Errors from building or feeding a subsequence matcher.
#[derive(Debug, thiserror::Error)]
pub enum SpringError {
    /// Returned when a fed sample's dimension differs from the references'.
    #[error("sample has {got} dimensions, references have {expected}")]
    DimensionMismatch {
        /// Dimension shared by the references.
        expected: usize,
        /// Dimension of the fed sample.
        got: usize,
    },

    /// Returned when references disagree on their sample dimension.
    #[error("reference {index} has dimension {got}, expected {expected}")]
    MixedDimensions {
        /// Position of the offending reference.
        index: usize,
        /// Dimension of the first reference.
        expected: usize,
        /// Dimension of the offending reference.
        got: usize,
    },

    /// Returned when a threshold is NaN or negative.
    #[error("match threshold must be a non-negative number, got {threshold}")]
    InvalidThreshold {
        /// The rejected threshold.
        threshold: f64,
    },

    /// Returned when the length window is empty.
    #[error("match length window [{min_len}, {max_len}] is empty")]
    InvalidLengthBounds {
        /// Shortest accepted match, in samples.
        min_len: usize,
        /// Longest accepted match, in samples.
        max_len: usize,
    },
}
