//! Sensor datasets, label files, window resampling and JSON artifacts for
//! the labelwise pipeline.

mod dataset;
mod domain;
mod error;
mod reader;
mod writer;

pub use dataset::{ResampleWindow, SensorDataset};
pub use domain::{ClassName, ConfirmationState, ExperimentName, Label, SuggestionProgress, SuggestionReport};
pub use error::IoError;
pub use reader::{DatasetReader, LabelReader};
pub use writer::SuggestionWriter;
