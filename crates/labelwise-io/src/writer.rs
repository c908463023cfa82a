//! JSON and CSV writers for suggestion results.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::{ExperimentName, Label, SuggestionReport};
use crate::IoError;

/// Writes suggestion results under one output directory.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_suggestions.json` and
/// `{experiment}_labels.csv`; a saved model goes to
/// `{experiment}_model.json`.
pub struct SuggestionWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl SuggestionWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write a finished request to `{experiment}_suggestions.json` and
    /// return the path.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | The report cannot be encoded |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all, fields(generation = report.generation))]
    pub fn write_suggestions(&self, report: &SuggestionReport) -> Result<PathBuf, IoError> {
        let path = self
            .output_dir
            .join(format!("{}_suggestions.json", self.experiment.as_str()));

        let artifact = SuggestionsArtifact {
            experiment: self.experiment.as_str(),
            n_candidates: report.candidates.len(),
            report,
        };

        let json = serde_json::to_string_pretty(&artifact)?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), n_candidates = artifact.n_candidates, "suggestions written");
        Ok(path)
    }

    /// Write labels to `{experiment}_labels.csv` as `class,start,end,state`,
    /// readable back with [`LabelReader`](crate::LabelReader), and return
    /// the path.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(n_labels = labels.len()))]
    pub fn write_labels(&self, labels: &[Label]) -> Result<PathBuf, IoError> {
        let path = self
            .output_dir
            .join(format!("{}_labels.csv", self.experiment.as_str()));
        let write_err = |e: csv::Error| IoError::WriteFile {
            path: path.clone(),
            source: e.into(),
        };

        let mut wtr = csv::Writer::from_path(&path).map_err(write_err)?;
        wtr.write_record(["class", "start", "end", "state"])
            .map_err(write_err)?;
        for label in labels {
            wtr.write_record([
                label.class_name.as_str(),
                &label.timestamp_start.to_string(),
                &label.timestamp_end.to_string(),
                &label.state.to_string(),
            ])
            .map_err(write_err)?;
        }
        wtr.flush().map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), "labels written");
        Ok(path)
    }

    /// Return the path where a built model should be saved.
    ///
    /// Does not write anything; just computes `{output_dir}/{experiment}_model.json`.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_model.json", self.experiment.as_str()))
    }
}

#[derive(Serialize)]
struct SuggestionsArtifact<'a> {
    experiment: &'a str,
    n_candidates: usize,
    #[serde(flatten)]
    report: &'a SuggestionReport,
}
