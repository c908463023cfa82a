//! Built reference set and its on-disk format.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use labelwise_dtw::Sequence;
use labelwise_io::ClassName;

use crate::error::SuggestError;

/// Current model format version.
const FORMAT_VERSION: u32 = 1;

/// Default number of samples fed per chunk, shared by all references.
pub const DEFAULT_CHUNK_BUDGET: usize = 100;

/// A class prototype with its spread and boundary corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLabel {
    /// Class the prototype stands for.
    pub class_name: ClassName,
    /// Prototype samples at the model's sample rate.
    pub series: Sequence,
    /// Mean DTW distance of the class exemplars to the prototype. `None`
    /// disables the reference.
    pub variance: Option<f64>,
    /// Seconds subtracted from a match's start time.
    pub adjustments_begin: f64,
    /// Seconds subtracted from a match's end time.
    pub adjustments_end: f64,
}

/// Immutable set of references plus the rate they were sampled at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionModel {
    sample_rate: f64,
    references: Vec<ReferenceLabel>,
    #[serde(default = "default_chunk_budget")]
    chunk_budget: usize,
}

fn default_chunk_budget() -> usize {
    DEFAULT_CHUNK_BUDGET
}

/// Versioned envelope for the serialized model.
#[derive(Serialize, Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    n_references: usize,
    dimension: Option<usize>,
    model: SuggestionModel,
}

impl SuggestionModel {
    /// Create a model from references sampled at `sample_rate` samples per second.
    #[must_use]
    pub fn new(sample_rate: f64, references: Vec<ReferenceLabel>) -> Self {
        Self {
            sample_rate,
            references,
            chunk_budget: DEFAULT_CHUNK_BUDGET,
        }
    }

    /// Set how many samples one suggestion chunk feeds in total. Each
    /// chunk covers `ceil(budget / n_active_references)` samples.
    #[must_use]
    pub fn with_chunk_budget(mut self, budget: usize) -> Self {
        self.chunk_budget = budget.max(1);
        self
    }

    /// Return the sample rate in samples per second.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Return every reference, enabled or not.
    #[must_use]
    pub fn references(&self) -> &[ReferenceLabel] {
        &self.references
    }

    /// Return the per-chunk sample budget.
    #[must_use]
    pub fn chunk_budget(&self) -> usize {
        self.chunk_budget
    }

    /// References with a variance, in model order.
    pub fn active_references(&self) -> impl Iterator<Item = &ReferenceLabel> {
        self.references.iter().filter(|r| r.variance.is_some())
    }

    /// Sample dimension of the references, `None` for an empty model.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.references.first().map(|r| r.series.dim())
    }

    /// Save the model as pretty JSON in a versioned envelope.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SuggestError::SerializeModel`] | JSON encoding failed |
    /// | [`SuggestError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SuggestError> {
        let path = path.as_ref();

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_references: self.references.len(),
            dimension: self.dimension(),
            model: self.clone(),
        };

        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| SuggestError::SerializeModel { source: e })?;

        std::fs::write(path, &json).map_err(|e| SuggestError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = json.len(),
            n_references = self.references.len(),
            "model saved"
        );
        Ok(())
    }

    /// Load a model saved by [`SuggestionModel::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SuggestError::ReadModel`] | file read failed |
    /// | [`SuggestError::DeserializeModel`] | JSON decoding failed |
    /// | [`SuggestError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SuggestError> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path).map_err(|e| SuggestError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        // Check the version before decoding the payload so an old model
        // reports the mismatch rather than a field error.
        let version: VersionProbe =
            serde_json::from_str(&text).map_err(|e| SuggestError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;
        if version.format_version != FORMAT_VERSION {
            return Err(SuggestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: version.format_version,
                path: path.to_path_buf(),
            });
        }

        let envelope: ModelEnvelope =
            serde_json::from_str(&text).map_err(|e| SuggestError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        debug!(
            n_references = envelope.n_references,
            dimension = ?envelope.dimension,
            "model loaded"
        );
        Ok(envelope.model)
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}
