//! DBA (DTW Barycenter Averaging) algorithm.

use tracing::{debug, instrument};

use crate::dtw::Dtw;
use crate::error::DbaError;
use crate::metric::DistanceMetric;
use crate::sequence::{Sequence, SequenceView};

/// Configuration for DBA barycenter computation.
#[derive(Debug, Clone)]
pub struct DbaConfig {
    max_iter: usize,
    tol: f64,
}

impl Default for DbaConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DbaConfig {
    /// Create a new DBA configuration with default parameters.
    ///
    /// Defaults: `max_iter = 10`, `tol = 1e-5`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_iter: 10,
            tol: 1e-5,
        }
    }

    /// Set the maximum number of iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance on the largest per-value change.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Return the maximum number of iterations.
    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Return the convergence tolerance.
    #[must_use]
    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Compute the DBA barycenter of `members`, starting from their medoid.
    ///
    /// Members may differ in length. The barycenter has the medoid's length.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DbaError::EmptyCluster`] | `members` is empty |
    /// | [`DbaError::DimensionMismatch`] | A member's dimension differs from the first member's |
    #[instrument(skip_all, fields(n = members.len(), max_iter = self.max_iter))]
    pub fn average<M: DistanceMetric>(
        &self,
        dtw: &Dtw<M>,
        members: &[SequenceView<'_>],
    ) -> Result<DbaResult, DbaError> {
        let medoid = dtw.medoid(members).ok_or(DbaError::EmptyCluster)?;
        self.average_from(dtw, members, members[medoid])
    }

    /// Refine `initial` towards the DBA barycenter of `members`.
    ///
    /// Each iteration aligns every member to the current centroid, collects
    /// the member samples aligned to each centroid position, and replaces
    /// that position with the metric's average of them. Positions nothing
    /// aligns to keep their value. Stops once the largest absolute change
    /// falls below the tolerance or `max_iter` is reached.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DbaError::EmptyCluster`] | `members` is empty |
    /// | [`DbaError::DimensionMismatch`] | A member's dimension differs from `initial`'s |
    #[instrument(skip_all, fields(n = members.len(), len = initial.len()))]
    pub fn average_from<M: DistanceMetric>(
        &self,
        dtw: &Dtw<M>,
        members: &[SequenceView<'_>],
        initial: SequenceView<'_>,
    ) -> Result<DbaResult, DbaError> {
        if members.is_empty() {
            return Err(DbaError::EmptyCluster);
        }
        let dim = initial.dim();
        if let Some((index, m)) = members.iter().enumerate().find(|(_, m)| m.dim() != dim) {
            return Err(DbaError::DimensionMismatch {
                index,
                expected: dim,
                got: m.dim(),
            });
        }

        let len = initial.len();
        let mut centroid_values = initial.as_flat().to_vec();
        let mut next_values = vec![0.0; centroid_values.len()];

        let mut delta = f64::INFINITY;
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            let mut aligned: Vec<Vec<&[f64]>> = vec![Vec::new(); len];

            // Dimensions already checked, lengths are non-zero.
            let centroid_view = SequenceView::new_unchecked(&centroid_values, dim);
            for member in members {
                let (_, path) = dtw.distance_and_path(centroid_view, *member);
                for step in path.steps() {
                    aligned[step.a].push(member.sample(step.b));
                }
            }

            for (t, points) in aligned.iter().enumerate() {
                let out = &mut next_values[t * dim..(t + 1) * dim];
                if points.is_empty() {
                    out.copy_from_slice(&centroid_values[t * dim..(t + 1) * dim]);
                } else {
                    dtw.metric().average(points, out);
                }
            }

            delta = max_abs_change(&centroid_values, &next_values);
            std::mem::swap(&mut centroid_values, &mut next_values);

            iterations = iter + 1;
            debug!(iteration = iterations, delta, "DBA iteration complete");

            if delta < self.tol {
                break;
            }
        }

        let centroid = Sequence::new(centroid_values, dim)?;
        Ok(DbaResult {
            centroid,
            converged: delta < self.tol,
            iterations,
            final_delta: delta,
        })
    }
}

/// Largest absolute change between two buffers, skipping NaN entries.
fn max_abs_change(old: &[f64], new: &[f64]) -> f64 {
    old.iter()
        .zip(new)
        .map(|(a, b)| (a - b).abs())
        .filter(|d| !d.is_nan())
        .fold(0.0, f64::max)
}

/// Result of a DBA computation.
#[derive(Debug, Clone)]
pub struct DbaResult {
    /// The computed centroid sequence.
    pub centroid: Sequence,
    /// Whether the algorithm converged within the tolerance.
    pub converged: bool,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Maximum absolute change in the final iteration.
    pub final_delta: f64,
}
