//! Configuration for reference building and suggestion requests.

use labelwise_cluster::KMeansConfig;

use crate::error::SuggestError;

/// Configuration for [`ReferenceBuilder`](crate::ReferenceBuilder).
///
/// Construct via [`BuilderConfig::default`], then chain `with_*` methods to
/// override defaults. Values are checked when the builder is created.
///
/// # Defaults
///
/// | Parameter                   | Default      |
/// |-----------------------------|--------------|
/// | `samples_per_longest_label` | 100          |
/// | `calibration_margin`        | 0.1          |
/// | `duration_tolerance`        | (0.8, 1.2)   |
/// | `prototypes_per_class`      | 1            |
/// | `max_iter`                  | 10           |
/// | `dba_max_iter`              | 10           |
/// | `tol`                       | 0.01         |
/// | `seed`                      | 42           |
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub(crate) samples_per_longest_label: usize,
    pub(crate) calibration_margin: f64,
    pub(crate) duration_tolerance: (f64, f64),
    pub(crate) prototypes_per_class: usize,
    pub(crate) max_iter: usize,
    pub(crate) dba_max_iter: usize,
    pub(crate) tol: f64,
    pub(crate) seed: u64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            samples_per_longest_label: 100,
            calibration_margin: 0.1,
            duration_tolerance: (0.8, 1.2),
            prototypes_per_class: 1,
            max_iter: 10,
            dba_max_iter: 10,
            tol: 0.01,
            seed: 42,
        }
    }
}

impl BuilderConfig {
    /// Set how many samples the longest label is resampled to. This fixes
    /// the model's sample rate.
    #[must_use]
    pub fn with_samples_per_longest_label(mut self, samples: usize) -> Self {
        self.samples_per_longest_label = samples;
        self
    }

    /// Set the calibration margin, as a fraction of each label's duration.
    #[must_use]
    pub fn with_calibration_margin(mut self, margin: f64) -> Self {
        self.calibration_margin = margin;
        self
    }

    /// Set the accepted match length as factors of the reference length.
    #[must_use]
    pub fn with_duration_tolerance(mut self, low: f64, high: f64) -> Self {
        self.duration_tolerance = (low, high);
        self
    }

    /// Set the number of prototypes clustered per class. Classes with fewer
    /// exemplars get one prototype per exemplar.
    #[must_use]
    pub fn with_prototypes_per_class(mut self, k: usize) -> Self {
        self.prototypes_per_class = k;
        self
    }

    /// Set the maximum number of k-means rounds.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of DBA iterations per centroid update.
    #[must_use]
    pub fn with_dba_max_iter(mut self, dba_max_iter: usize) -> Self {
        self.dba_max_iter = dba_max_iter;
        self
    }

    /// Set the k-means convergence tolerance.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the k-means seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the sample budget of the longest label.
    #[must_use]
    pub fn samples_per_longest_label(&self) -> usize {
        self.samples_per_longest_label
    }

    /// Return the calibration margin fraction.
    #[must_use]
    pub fn calibration_margin(&self) -> f64 {
        self.calibration_margin
    }

    /// Return the accepted length factors.
    #[must_use]
    pub fn duration_tolerance(&self) -> (f64, f64) {
        self.duration_tolerance
    }

    /// Return the number of prototypes per class.
    #[must_use]
    pub fn prototypes_per_class(&self) -> usize {
        self.prototypes_per_class
    }

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SuggestError::InvalidSampleBudget`] | `samples_per_longest_label < 2` |
    /// | [`SuggestError::InvalidCalibrationMargin`] | Margin negative or non-finite |
    /// | [`SuggestError::InvalidDurationTolerance`] | Not `0 < low <= 1 <= high` |
    /// | [`SuggestError::Cluster`] | `prototypes_per_class` is zero |
    pub fn validate(&self) -> Result<(), SuggestError> {
        if self.samples_per_longest_label < 2 {
            return Err(SuggestError::InvalidSampleBudget {
                samples: self.samples_per_longest_label,
            });
        }
        if !self.calibration_margin.is_finite() || self.calibration_margin < 0.0 {
            return Err(SuggestError::InvalidCalibrationMargin {
                margin: self.calibration_margin,
            });
        }
        let (low, high) = self.duration_tolerance;
        if !(low > 0.0 && low <= 1.0 && high >= 1.0 && high.is_finite()) {
            return Err(SuggestError::InvalidDurationTolerance { low, high });
        }
        self.kmeans(self.prototypes_per_class)?;
        Ok(())
    }

    /// K-means configuration for a class, with `k` capped by its exemplars.
    pub(crate) fn kmeans(&self, k: usize) -> Result<KMeansConfig, SuggestError> {
        Ok(KMeansConfig::new(k)?
            .with_max_iter(self.max_iter)
            .with_dba_max_iter(self.dba_max_iter)
            .with_tol(self.tol)
            .with_seed(self.seed))
    }
}

/// Inclusive range of accepted match lengths for a reference of `len`
/// samples under the given length factors.
pub(crate) fn length_window(len: usize, (low, high): (f64, f64)) -> (usize, usize) {
    // Guard against 0.8 * 5 = 3.9999999999999996.
    const EPS: f64 = 1e-9;
    let min = ((len as f64 * low) - EPS).ceil().max(1.0) as usize;
    let max = ((len as f64 * high) + EPS).floor() as usize;
    (min, max.max(min))
}

/// One suggestion request.
///
/// Values are checked when the computation starts; an invalid request is
/// reported through the sink's error channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuggestionRequest {
    /// Requested start time, before snapping.
    pub timestamp_start: f64,
    /// Requested end time, before snapping.
    pub timestamp_end: f64,
    /// Minimum confidence in `(0, 1]` a candidate must reach.
    pub confidence_threshold: f64,
    /// Caller-assigned generation tag copied into every update.
    pub generation: u64,
}

impl SuggestionRequest {
    /// Create a request.
    #[must_use]
    pub fn new(timestamp_start: f64, timestamp_end: f64, confidence_threshold: f64, generation: u64) -> Self {
        Self {
            timestamp_start,
            timestamp_end,
            confidence_threshold,
            generation,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SuggestError> {
        if !self.timestamp_start.is_finite()
            || !self.timestamp_end.is_finite()
            || self.timestamp_end <= self.timestamp_start
        {
            return Err(SuggestError::InvalidRange {
                start: self.timestamp_start,
                end: self.timestamp_end,
            });
        }
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
            return Err(SuggestError::InvalidConfidence {
                threshold: self.confidence_threshold,
            });
        }
        Ok(())
    }
}
