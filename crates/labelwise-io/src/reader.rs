//! CSV readers for sensor recordings and label files.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::dataset::SensorDataset;
use crate::domain::{ClassName, ConfirmationState, Label};
use crate::IoError;

fn open_csv(path: &Path) -> Result<csv::Reader<File>, IoError> {
    let file = File::open(path).map_err(|e| IoError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;
    // flexible(true) so our own row-length check fires instead of a CsvParse error.
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn csv_error(path: &Path, e: csv::Error) -> IoError {
    IoError::CsvParse {
        path: path.to_path_buf(),
        offset: e.position().map_or(0, |p| p.byte()),
        source: e,
    }
}

/// Parse a required finite number.
fn parse_finite(path: &Path, row_index: usize, col_index: usize, raw: &str) -> Result<f64, IoError> {
    let value: f64 = raw.parse().map_err(|_| IoError::InvalidValue {
        path: path.to_path_buf(),
        row_index,
        col_index,
        raw: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(IoError::NonFiniteValue {
            path: path.to_path_buf(),
            row_index,
            col_index,
            raw: raw.to_string(),
        });
    }
    Ok(value)
}

/// Parse a sensor reading. Blank cells and `NaN` are missing readings.
fn parse_reading(path: &Path, row_index: usize, col_index: usize, raw: &str) -> Result<f64, IoError> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    let value: f64 = raw.parse().map_err(|_| IoError::InvalidValue {
        path: path.to_path_buf(),
        row_index,
        col_index,
        raw: raw.to_string(),
    })?;
    if value.is_infinite() {
        return Err(IoError::NonFiniteValue {
            path: path.to_path_buf(),
            row_index,
            col_index,
            raw: raw.to_string(),
        });
    }
    Ok(value)
}

/// Reads a timestamped sensor recording from CSV.
///
/// Expected format: a header `timestamp,<column>,...` with at least one
/// value column, then one row per sample. Timestamps are seconds and must
/// strictly increase. Blank or `NaN` cells are missing readings.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumns`] | Header has fewer than two columns |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::InvalidValue`] | Cell is not a number |
/// | [`IoError::NonFiniteValue`] | Timestamp is NaN/Inf, or a reading is Inf |
/// | [`IoError::UnorderedTimestamps`] | Timestamps do not strictly increase |
pub struct DatasetReader {
    path: PathBuf,
}

impl DatasetReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`SensorDataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<SensorDataset, IoError> {
        let mut rdr = open_csv(&self.path)?;

        let header = rdr.headers().map_err(|e| csv_error(&self.path, e))?.clone();
        if header.len() < 2 {
            return Err(IoError::MissingColumns {
                path: self.path.clone(),
                expected: "timestamp,<column>,...",
            });
        }
        let expected_cols = header.len();
        let column_names: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
        debug!(expected_cols, "read CSV header");

        let mut timestamps = Vec::new();
        let mut rows = Vec::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| csv_error(&self.path, e))?;
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            timestamps.push(parse_finite(&self.path, row_index, 0, &record[0])?);
            let row = (1..expected_cols)
                .map(|col_index| parse_reading(&self.path, row_index, col_index, &record[col_index]))
                .collect::<Result<Vec<f64>, _>>()?;
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let dataset = SensorDataset::with_columns(column_names, timestamps, rows)?;
        let (first, last) = dataset.time_range();
        info!(
            n_rows = dataset.len(),
            dimension = dataset.column_names().len(),
            first,
            last,
            "dataset loaded"
        );
        Ok(dataset)
    }
}

/// Reads labels from CSV.
///
/// Expected format: a header `class,start,end` with an optional fourth
/// `state` column. Times are seconds. A missing or blank state means the
/// label is fully confirmed, since hand-written label files hold ground
/// truth.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumns`] | Header has fewer than three columns |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::EmptyClassName`] | Class cell is blank |
/// | [`IoError::InvalidValue`] | Start or end is not a number |
/// | [`IoError::NonFiniteValue`] | Start or end is NaN/Inf |
/// | [`IoError::InvalidConfirmationState`] | State cell is not recognised |
pub struct LabelReader {
    path: PathBuf,
}

impl LabelReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read the label file. An empty file (header only) yields no labels.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<Label>, IoError> {
        let mut rdr = open_csv(&self.path)?;

        let expected_cols = rdr.headers().map_err(|e| csv_error(&self.path, e))?.len();
        if !(3..=4).contains(&expected_cols) {
            return Err(IoError::MissingColumns {
                path: self.path.clone(),
                expected: "class,start,end[,state]",
            });
        }

        let mut labels = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| csv_error(&self.path, e))?;
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let class = &record[0];
            if class.is_empty() {
                return Err(IoError::EmptyClassName {
                    path: self.path.clone(),
                    row_index,
                });
            }
            let start = parse_finite(&self.path, row_index, 1, &record[1])?;
            let end = parse_finite(&self.path, row_index, 2, &record[2])?;
            let state = match record.get(3) {
                None | Some("") => ConfirmationState::ConfirmedBoth,
                Some(raw) => raw.parse().map_err(|raw| IoError::InvalidConfirmationState {
                    path: self.path.clone(),
                    row_index,
                    raw,
                })?,
            };

            labels.push(Label::new(ClassName::new(class), start, end).with_state(state));
        }

        info!(n_labels = labels.len(), "labels loaded");
        Ok(labels)
    }
}
