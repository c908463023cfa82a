use std::path::PathBuf;

use labelwise_cluster::ClusterError;
use labelwise_io::IoError;
use labelwise_spring::SpringError;

/// Errors from building references, running suggestions and exporting models.
#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    /// Returned when a training label has non-finite bounds or `end <= start`.
    #[error("label {index} spans [{start}, {end}]: start must be before end")]
    InvalidLabel {
        /// Zero-based index of the label in the input.
        index: usize,
        /// Label start time.
        start: f64,
        /// Label end time.
        end: f64,
    },

    /// Returned when `samples_per_longest_label` is below 2.
    #[error("samples_per_longest_label must be at least 2, got {samples}")]
    InvalidSampleBudget {
        /// The invalid value provided.
        samples: usize,
    },

    /// Returned when the calibration margin is negative or not finite.
    #[error("calibration_margin must be finite and >= 0, got {margin}")]
    InvalidCalibrationMargin {
        /// The invalid value provided.
        margin: f64,
    },

    /// Returned when the duration tolerance does not bracket 1.
    #[error("duration tolerance must satisfy 0 < low <= 1 <= high, got ({low}, {high})")]
    InvalidDurationTolerance {
        /// Lower length factor.
        low: f64,
        /// Upper length factor.
        high: f64,
    },

    /// Returned when a suggestion range is empty, inverted or non-finite.
    #[error("invalid suggestion range [{start}, {end}]")]
    InvalidRange {
        /// Requested start time.
        start: f64,
        /// Requested end time.
        end: f64,
    },

    /// Returned when the confidence threshold is outside `(0, 1]`.
    #[error("confidence threshold must be in (0, 1], got {threshold}")]
    InvalidConfidence {
        /// The invalid threshold.
        threshold: f64,
    },

    /// Returned when the dataset's dimension differs from the references'.
    #[error("dataset has dimension {got}, references expect {expected}")]
    DimensionMismatch {
        /// Dimension of the references.
        expected: usize,
        /// Dimension of the dataset.
        got: usize,
    },

    /// Returned when deployment code is requested for an unknown platform.
    #[error("unsupported deployment platform \"{platform}\" (expected arduino or microbit)")]
    UnsupportedPlatform {
        /// The requested platform name.
        platform: String,
    },

    /// Wraps a dataset or resampling error.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Wraps a clustering error.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Wraps a matcher error.
    #[error(transparent)]
    Spring(#[from] SpringError),

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}
