//! Online SPRING matcher over several references.

use tracing::{debug, instrument};

use labelwise_dtw::{DistanceMetric, Manhattan};

use crate::column::Column;
use crate::error::SpringError;
use crate::reference::{MatchResult, SpringReference};

/// Best candidate seen so far for one reference, not yet reported.
#[derive(Debug, Clone, Copy)]
struct Pending {
    distance: f64,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
struct ReferenceState {
    reference: SpringReference,
    column: Column,
    pending: Option<Pending>,
}

impl ReferenceState {
    fn report(&mut self, reference_index: usize) -> Option<MatchResult> {
        let p = self.pending.take()?;
        self.column.consume(p.end);
        Some(MatchResult {
            reference_index,
            distance: p.distance,
            start_index: p.start,
            end_index: p.end,
        })
    }
}

/// Streaming subsequence matcher.
///
/// Each fed sample advances every reference's column once: O(R * |ref|)
/// time and space per sample. A reference's best candidate is reported once
/// no live alignment that overlaps it can still undercut it; its span is then
/// consumed so it is never reported twice.
#[derive(Debug, Clone)]
pub struct SpringMatcher<M = Manhattan> {
    metric: M,
    states: Vec<ReferenceState>,
    dim: Option<usize>,
    t: usize,
}

impl SpringMatcher<Manhattan> {
    /// Create a matcher over `references` using the L1 sample metric.
    ///
    /// # Errors
    ///
    /// See [`SpringMatcher::with_metric`].
    pub fn new(references: Vec<SpringReference>) -> Result<Self, SpringError> {
        Self::with_metric(Manhattan, references)
    }
}

impl<M: DistanceMetric> SpringMatcher<M> {
    /// Create a matcher over `references` using `metric`.
    ///
    /// An empty reference list is allowed; such a matcher never fires.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SpringError::MixedDimensions`] | References differ in sample dimension |
    #[instrument(skip_all, fields(n_references = references.len()))]
    pub fn with_metric(metric: M, references: Vec<SpringReference>) -> Result<Self, SpringError> {
        let dim = common_dimension(&references)?;
        let states = references
            .into_iter()
            .map(|reference| ReferenceState {
                column: Column::new(reference.series().len()),
                reference,
                pending: None,
            })
            .collect();
        Ok(Self {
            metric,
            states,
            dim,
            t: 0,
        })
    }

    /// Feed the next stream sample.
    ///
    /// Calls `on_match` once per reference that fires at this step, in
    /// reference order, and returns the lowest-cost match among them.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SpringError::DimensionMismatch`] | `sample.len()` differs from the references' dimension |
    pub fn feed<F>(&mut self, sample: &[f64], mut on_match: F) -> Result<Option<MatchResult>, SpringError>
    where
        F: FnMut(MatchResult),
    {
        if let Some(expected) = self.dim
            && sample.len() != expected
        {
            return Err(SpringError::DimensionMismatch {
                expected,
                got: sample.len(),
            });
        }

        let t = self.t;
        let mut best: Option<MatchResult> = None;

        for (index, state) in self.states.iter_mut().enumerate() {
            state
                .column
                .advance(&self.metric, state.reference.series().as_view(), t, sample);

            if let Some(p) = state.pending
                && state.column.cannot_improve(p.distance, p.end)
                && let Some(m) = state.report(index)
            {
                debug!(
                    reference = index,
                    distance = m.distance,
                    start = m.start_index,
                    end = m.end_index,
                    "match fired"
                );
                on_match(m);
                best = lower(best, m);
            }

            let cost = state.column.full_cost();
            let start = state.column.full_start();
            let beats_pending = state.pending.is_none_or(|p| cost < p.distance);
            if cost <= state.reference.threshold()
                && beats_pending
                && state.reference.accepts_len(t - start + 1)
            {
                state.pending = Some(Pending {
                    distance: cost,
                    start,
                    end: t,
                });
            }
        }

        self.t += 1;
        Ok(best)
    }

    /// Report every pending candidate, as if the stream had ended.
    ///
    /// Calls `on_match` per reference in reference order and returns the
    /// lowest-cost match among them.
    pub fn flush<F>(&mut self, mut on_match: F) -> Option<MatchResult>
    where
        F: FnMut(MatchResult),
    {
        let mut best = None;
        for (index, state) in self.states.iter_mut().enumerate() {
            if let Some(m) = state.report(index) {
                debug!(reference = index, distance = m.distance, "pending match flushed");
                on_match(m);
                best = lower(best, m);
            }
        }
        best
    }

}

/// Lower-cost of two matches; the earlier one wins ties.
fn lower(current: Option<MatchResult>, candidate: MatchResult) -> Option<MatchResult> {
    match current {
        Some(c) if c.distance <= candidate.distance => Some(c),
        _ => Some(candidate),
    }
}

/// Sample dimension shared by all references, `None` when there are none.
pub(crate) fn common_dimension(references: &[SpringReference]) -> Result<Option<usize>, SpringError> {
    let Some(first) = references.first() else {
        return Ok(None);
    };
    let expected = first.series().dim();
    match references
        .iter()
        .enumerate()
        .find(|(_, r)| r.series().dim() != expected)
    {
        Some((index, r)) => Err(SpringError::MixedDimensions {
            index,
            expected,
            got: r.series().dim(),
        }),
        None => Ok(Some(expected)),
    }
}
