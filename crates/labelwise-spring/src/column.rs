//! One reference's slice of the SPRING cost matrix (private module).

use labelwise_dtw::{DistanceMetric, SequenceView};

/// Current and previous cost/start columns for one reference.
///
/// Cell `i` holds the cheapest cost of aligning the first `i` reference
/// samples with a stream span ending at the current sample, and the stream
/// index where that span starts. Cell 0 is the free starting point.
#[derive(Debug, Clone)]
pub(crate) struct Column {
    cost: Vec<f64>,
    start: Vec<usize>,
    prev_cost: Vec<f64>,
    prev_start: Vec<usize>,
}

impl Column {
    pub(crate) fn new(reference_len: usize) -> Self {
        Self {
            cost: vec![f64::INFINITY; reference_len + 1],
            start: vec![0; reference_len + 1],
            prev_cost: vec![f64::INFINITY; reference_len + 1],
            prev_start: vec![0; reference_len + 1],
        }
    }

    /// Advance by the stream sample `x` at index `t`.
    ///
    /// Ties prefer the diagonal step, then staying on the same stream
    /// sample, then staying on the same reference sample.
    pub(crate) fn advance<M: DistanceMetric>(
        &mut self,
        metric: &M,
        reference: SequenceView<'_>,
        t: usize,
        x: &[f64],
    ) {
        std::mem::swap(&mut self.cost, &mut self.prev_cost);
        std::mem::swap(&mut self.start, &mut self.prev_start);

        self.cost[0] = 0.0;
        self.start[0] = t;

        for i in 1..self.cost.len() {
            // The first reference sample always opens a span at t.
            let (diag, diag_start) = if i == 1 {
                (0.0, t)
            } else {
                (self.prev_cost[i - 1], self.prev_start[i - 1])
            };
            let (up, up_start) = (self.cost[i - 1], self.start[i - 1]);
            let (left, left_start) = (self.prev_cost[i], self.prev_start[i]);

            let (best, start) = if diag <= up && diag <= left {
                (diag, diag_start)
            } else if up <= left {
                (up, up_start)
            } else {
                (left, left_start)
            };

            self.cost[i] = metric.distance(x, reference.sample(i - 1)) + best;
            self.start[i] = start;
        }
    }

    /// Cost of a full-reference alignment ending at the current sample.
    pub(crate) fn full_cost(&self) -> f64 {
        self.cost[self.cost.len() - 1]
    }

    /// Start index of the full-reference alignment.
    pub(crate) fn full_start(&self) -> usize {
        self.start[self.start.len() - 1]
    }

    /// True when no live cell can still beat `d_min` with a span that
    /// overlaps one ending at `t_e`.
    pub(crate) fn cannot_improve(&self, d_min: f64, t_e: usize) -> bool {
        self.cost
            .iter()
            .zip(&self.start)
            .skip(1)
            .all(|(&d, &s)| d >= d_min || s > t_e)
    }

    /// Invalidate every cell whose span starts at or before `t_e`.
    pub(crate) fn consume(&mut self, t_e: usize) {
        for (d, &s) in self.cost.iter_mut().zip(&self.start).skip(1) {
            if s <= t_e {
                *d = f64::INFINITY;
            }
        }
    }
}
