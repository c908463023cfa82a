//! Error types for sequence validation, DTW computation and DBA averaging.

/// Errors from sequence validation and DTW computation.
#[derive(Debug, thiserror::Error)]
pub enum DtwError {
    /// Returned when a sequence has no samples.
    #[error("sequence must contain at least one sample")]
    EmptySequence,

    /// Returned when samples have zero dimensions.
    #[error("samples must have at least one dimension")]
    ZeroDimension,

    /// Returned when a sample's dimension differs from the first sample's.
    #[error("sample {index} has {got} dimensions, expected {expected}")]
    DimensionMismatch {
        /// Position of the offending sample.
        index: usize,
        /// Dimension of the first sample.
        expected: usize,
        /// Dimension of the offending sample.
        got: usize,
    },

    /// Returned when a flat buffer's length is not a multiple of the dimension.
    #[error("buffer of {len} values cannot be split into samples of dimension {dim}")]
    RaggedBuffer {
        /// Length of the flat buffer.
        len: usize,
        /// Requested sample dimension.
        dim: usize,
    },

    /// Returned when a value is positive or negative infinity.
    ///
    /// NaN is accepted and treated as a missing dimension.
    #[error("sequence contains an infinite value at sample {sample}, dimension {dimension}")]
    InfiniteValue {
        /// Sample index of the first infinite value.
        sample: usize,
        /// Dimension index of the first infinite value.
        dimension: usize,
    },
}

/// Errors from DBA barycenter averaging.
#[derive(Debug, thiserror::Error)]
pub enum DbaError {
    /// Returned when averaging is requested for an empty set of sequences.
    #[error("cannot compute barycenter of an empty cluster")]
    EmptyCluster,

    /// Returned when members and the initial centroid disagree on dimension.
    #[error("member {index} has dimension {got}, centroid has {expected}")]
    DimensionMismatch {
        /// Position of the offending member.
        index: usize,
        /// Centroid dimension.
        expected: usize,
        /// Member dimension.
        got: usize,
    },

    /// Wraps a sequence error raised while rebuilding the centroid.
    #[error("DTW error during DBA: {0}")]
    Dtw(#[from] DtwError),
}
