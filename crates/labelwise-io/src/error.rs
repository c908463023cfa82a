//! I/O error types for labelwise-io.

use std::path::PathBuf;

use labelwise_dtw::DtwError;

/// Errors from file I/O, CSV parsing, window resampling and serialization.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the header lacks required columns.
    #[error("{path}: header must be `{expected}`")]
    MissingColumns {
        /// Path to the CSV file.
        path: PathBuf,
        /// Human-readable description of the expected header.
        expected: &'static str,
    },

    /// Returned when a dataset contains no samples.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a cell cannot be parsed as a number.
    #[error("invalid value in {path}: row {row_index}, column {col_index}, raw value \"{raw}\"")]
    InvalidValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Zero-based column index.
        col_index: usize,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when a cell is infinite, or a timestamp is not finite.
    #[error("non-finite value in {path}: row {row_index}, column {col_index}, raw value \"{raw}\"")]
    NonFiniteValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Zero-based column index.
        col_index: usize,
        /// The raw string value.
        raw: String,
    },

    /// Returned when a confirmation state cell is not recognised.
    #[error("unknown confirmation state \"{raw}\" in {path}, row {row_index}")]
    InvalidConfirmationState {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// The raw string value.
        raw: String,
    },

    /// Returned when a class name cell is blank.
    #[error("empty class name in {path}, row {row_index}")]
    EmptyClassName {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
    },

    /// Returned when dataset timestamps do not strictly increase.
    #[error("timestamps must strictly increase: row {row_index} does not")]
    UnorderedTimestamps {
        /// Zero-based row index of the offending timestamp.
        row_index: usize,
    },

    /// Returned when dataset rows disagree on the sample dimension.
    #[error("row {row_index} has {got} values, expected {expected}")]
    RowDimensionMismatch {
        /// Zero-based row index.
        row_index: usize,
        /// Dimension of the first row.
        expected: usize,
        /// Dimension of the offending row.
        got: usize,
    },

    /// Returned when a resample request has an empty window or zero samples.
    #[error("cannot resample [{start}, {end}) into {count} samples")]
    InvalidWindow {
        /// Window start time.
        start: f64,
        /// Window end time.
        end: f64,
        /// Requested sample count.
        count: usize,
    },

    /// Wraps a sequence validation error.
    #[error(transparent)]
    Sequence(#[from] DtwError),

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact cannot be serialized.
    #[error("cannot serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
