//! Offline variant of the matcher that keeps only the single best match.

use labelwise_dtw::{DistanceMetric, Manhattan};

use crate::column::Column;
use crate::error::SpringError;
use crate::reference::{MatchResult, SpringReference};
use crate::spring::common_dimension;

/// Finds the lowest-cost occurrence of any reference in a finite buffer.
///
/// Uses the same recurrence as [`SpringMatcher`](crate::SpringMatcher) but
/// never fires or consumes spans. Ties keep the earliest-ending match, then
/// the lowest reference index.
#[derive(Debug, Clone)]
pub struct BestMatchMatcher<M = Manhattan> {
    metric: M,
    references: Vec<SpringReference>,
    columns: Vec<Column>,
    dim: Option<usize>,
    t: usize,
    best: Option<MatchResult>,
}

impl BestMatchMatcher<Manhattan> {
    /// Create a best-match matcher over `references` using the L1 sample metric.
    ///
    /// # Errors
    ///
    /// See [`BestMatchMatcher::with_metric`].
    pub fn new(references: Vec<SpringReference>) -> Result<Self, SpringError> {
        Self::with_metric(Manhattan, references)
    }
}

impl<M: DistanceMetric> BestMatchMatcher<M> {
    /// Create a best-match matcher over `references` using `metric`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SpringError::MixedDimensions`] | References differ in sample dimension |
    pub fn with_metric(metric: M, references: Vec<SpringReference>) -> Result<Self, SpringError> {
        let dim = common_dimension(&references)?;
        let columns = references.iter().map(|r| Column::new(r.series().len())).collect();
        Ok(Self {
            metric,
            references,
            columns,
            dim,
            t: 0,
            best: None,
        })
    }

    /// Feed the next buffer sample.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SpringError::DimensionMismatch`] | `sample.len()` differs from the references' dimension |
    pub fn feed(&mut self, sample: &[f64]) -> Result<(), SpringError> {
        if let Some(expected) = self.dim
            && sample.len() != expected
        {
            return Err(SpringError::DimensionMismatch {
                expected,
                got: sample.len(),
            });
        }

        let t = self.t;
        for (index, (reference, column)) in self.references.iter().zip(&mut self.columns).enumerate() {
            column.advance(&self.metric, reference.series().as_view(), t, sample);

            let cost = column.full_cost();
            let start = column.full_start();
            let improves = self.best.is_none_or(|b| cost < b.distance);
            if cost <= reference.threshold() && improves && reference.accepts_len(t - start + 1) {
                self.best = Some(MatchResult {
                    reference_index: index,
                    distance: cost,
                    start_index: start,
                    end_index: t,
                });
            }
        }

        self.t += 1;
        Ok(())
    }

    /// Feed every sample of `samples` in order.
    ///
    /// # Errors
    ///
    /// Stops at the first sample rejected by [`BestMatchMatcher::feed`].
    pub fn feed_all<'a, I>(&mut self, samples: I) -> Result<(), SpringError>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        samples.into_iter().try_for_each(|s| self.feed(s))
    }

    /// Return the best match seen so far, if any passed the acceptance rules.
    #[must_use]
    pub fn best_match(&self) -> Option<MatchResult> {
        self.best
    }
}
