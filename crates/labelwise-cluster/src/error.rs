use labelwise_dtw::DbaError;

/// Errors from K-means clustering operations.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Returned when k is zero.
    #[error("k must be at least 1, got {k}")]
    InvalidK {
        /// The invalid k value provided.
        k: usize,
    },

    /// Returned when fewer sequences are provided than the requested k.
    #[error("need at least {k} sequences to form {k} clusters, got {n_sequences}")]
    TooFewSequences {
        /// Number of sequences provided.
        n_sequences: usize,
        /// Requested number of clusters.
        k: usize,
    },

    /// Returned when the sequences do not share one sample dimension.
    #[error("sequence {index} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        /// Position of the offending sequence.
        index: usize,
        /// Dimension of the first sequence.
        expected: usize,
        /// Dimension of the offending sequence.
        got: usize,
    },

    /// Wraps a DBA error encountered during centroid computation.
    #[error("DBA error during centroid update: {0}")]
    Dba(#[from] DbaError),
}
