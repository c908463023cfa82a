//! Domain types for labelwise-io.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::IoError;

/// Name of a label class, e.g. `"wave"` or `"jump"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    /// Create a class name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Return the class name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClassName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which boundaries of a label the user has confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    /// Neither boundary confirmed; suggestions start here.
    #[default]
    Unconfirmed,
    /// Only the start boundary is confirmed.
    ConfirmedStart,
    /// Only the end boundary is confirmed.
    ConfirmedEnd,
    /// Both boundaries are confirmed.
    ConfirmedBoth,
}

impl ConfirmationState {
    /// True for every state except [`ConfirmationState::Unconfirmed`].
    #[must_use]
    pub fn is_confirmed(self) -> bool {
        self != Self::Unconfirmed
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Unconfirmed => "unconfirmed",
            Self::ConfirmedStart => "confirmed_start",
            Self::ConfirmedEnd => "confirmed_end",
            Self::ConfirmedBoth => "confirmed_both",
        }
    }
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmationState {
    type Err = String;

    /// Accepts the snake_case names plus the short forms `start`, `end`,
    /// `both` and `confirmed`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unconfirmed" => Ok(Self::Unconfirmed),
            "confirmed_start" | "start" => Ok(Self::ConfirmedStart),
            "confirmed_end" | "end" => Ok(Self::ConfirmedEnd),
            "confirmed_both" | "both" | "confirmed" => Ok(Self::ConfirmedBoth),
            _ => Err(s.to_string()),
        }
    }
}

/// A class span on the dataset timeline, in seconds.
///
/// Suggested labels carry the confidence and the generation of the request
/// that produced them; user labels leave both `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Class of the span.
    pub class_name: ClassName,
    /// Start time.
    pub timestamp_start: f64,
    /// End time.
    pub timestamp_end: f64,
    /// Confirmation state.
    pub state: ConfirmationState,
    /// Likelihood in `(0, 1]` for suggestions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_confidence: Option<f64>,
    /// Request generation for suggestions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_generation: Option<u64>,
}

impl Label {
    /// Create an unconfirmed label with no suggestion metadata.
    pub fn new(class_name: impl Into<ClassName>, timestamp_start: f64, timestamp_end: f64) -> Self {
        Self {
            class_name: class_name.into(),
            timestamp_start,
            timestamp_end,
            state: ConfirmationState::Unconfirmed,
            suggestion_confidence: None,
            suggestion_generation: None,
        }
    }

    /// Create a suggested label.
    pub fn suggestion(
        class_name: ClassName,
        timestamp_start: f64,
        timestamp_end: f64,
        confidence: f64,
        generation: u64,
    ) -> Self {
        Self {
            suggestion_confidence: Some(confidence),
            suggestion_generation: Some(generation),
            ..Self::new(class_name, timestamp_start, timestamp_end)
        }
    }

    /// Set the confirmation state.
    #[must_use]
    pub fn with_state(mut self, state: ConfirmationState) -> Self {
        self.state = state;
        self
    }

    /// Return `timestamp_end - timestamp_start`.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.timestamp_end - self.timestamp_start
    }
}

/// Progress of one suggestion computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuggestionProgress {
    /// Snapped start of the requested range.
    pub timestamp_start: f64,
    /// Snapped end of the requested range.
    pub timestamp_end: f64,
    /// Time up to which the range has been processed.
    pub timestamp_completed: f64,
    /// Generation of the request.
    pub generation: u64,
    /// Counts of the best match per fed sample, bucketed by confidence.
    pub confidence_histogram: Option<[u32; 10]>,
}

impl SuggestionProgress {
    /// Processed share of the range, in `[0, 1]`.
    #[must_use]
    pub fn fraction_completed(&self) -> f64 {
        let span = self.timestamp_end - self.timestamp_start;
        if span <= 0.0 {
            return 1.0;
        }
        ((self.timestamp_completed - self.timestamp_start) / span).clamp(0.0, 1.0)
    }
}

/// Everything one finished suggestion request produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionReport {
    /// Generation of the request.
    pub generation: u64,
    /// Snapped start of the processed range.
    pub timestamp_start: f64,
    /// Snapped end of the processed range.
    pub timestamp_end: f64,
    /// Confidence threshold the request used.
    pub confidence_threshold: f64,
    /// Suggested labels in delivery order.
    pub candidates: Vec<Label>,
    /// Final confidence histogram, when any reference was active.
    pub confidence_histogram: Option<[u32; 10]>,
}

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
