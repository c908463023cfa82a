//! DTW alignment cost and warping paths between multivariate sequences.

use rayon::prelude::*;
use tracing::instrument;

use crate::distance::DtwDistance;
use crate::matrix::DistanceMatrix;
use crate::metric::{DistanceMetric, Manhattan};
use crate::path::{WarpingPath, WarpingStep};
use crate::sequence::SequenceView;

/// Immutable DTW calculator over a per-sample metric. Thread-safe.
///
/// Sequences may differ in length; they must share a sample dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dtw<M = Manhattan> {
    metric: M,
}

impl Dtw<Manhattan> {
    /// DTW under the sum-of-absolute-differences metric.
    #[must_use]
    pub fn manhattan() -> Self {
        Self { metric: Manhattan }
    }
}

impl<M: DistanceMetric> Dtw<M> {
    /// Create a DTW calculator over `metric`.
    #[must_use]
    pub fn new(metric: M) -> Self {
        Self { metric }
    }

    /// Return the per-sample metric.
    #[must_use]
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Compute the DTW alignment cost between two sequences.
    ///
    /// Uses a rolling two-row buffer: O(n * m) time, O(m) space.
    #[must_use]
    #[instrument(level = "trace", skip_all, fields(n = a.len(), m = b.len()))]
    pub fn distance(&self, a: SequenceView<'_>, b: SequenceView<'_>) -> DtwDistance {
        DtwDistance::new(self.rolling_cost(a, b, None))
    }

    /// Compute the DTW alignment cost, abandoning early once it must exceed `cutoff`.
    ///
    /// Exact: a finite return value equals `self.distance(a, b)`. Otherwise
    /// returns [`DtwDistance::INFINITY`].
    #[must_use]
    pub fn distance_with_cutoff(
        &self,
        a: SequenceView<'_>,
        b: SequenceView<'_>,
        cutoff: f64,
    ) -> DtwDistance {
        DtwDistance::new(self.rolling_cost(a, b, Some(cutoff)))
    }

    /// Compute the DTW alignment cost and the optimal warping path.
    ///
    /// Allocates the full cost matrix and a direction array for traceback:
    /// O(n * m) time and space. Ties prefer the diagonal step.
    #[must_use]
    #[instrument(level = "trace", skip_all, fields(n = a.len(), m = b.len()))]
    pub fn distance_and_path(
        &self,
        a: SequenceView<'_>,
        b: SequenceView<'_>,
    ) -> (DtwDistance, WarpingPath) {
        debug_assert_eq!(a.dim(), b.dim(), "sequences must share a dimension");
        let n = a.len();
        let m = b.len();

        let mut cost = vec![f64::INFINITY; n * m];
        // 0 = diagonal, 1 = above (i-1), 2 = left (j-1)
        let mut dirs = vec![0u8; n * m];

        for i in 0..n {
            let ai = a.sample(i);
            for j in 0..m {
                let c = self.metric.distance(ai, b.sample(j));
                let idx = i * m + j;

                if i == 0 && j == 0 {
                    cost[idx] = c;
                    continue;
                }

                let diag = if i > 0 && j > 0 { cost[idx - m - 1] } else { f64::INFINITY };
                let above = if i > 0 { cost[idx - m] } else { f64::INFINITY };
                let left = if j > 0 { cost[idx - 1] } else { f64::INFINITY };

                let (min_val, dir) = if diag <= above && diag <= left {
                    (diag, 0u8)
                } else if above <= left {
                    (above, 1u8)
                } else {
                    (left, 2u8)
                };

                cost[idx] = c + min_val;
                dirs[idx] = dir;
            }
        }

        let mut steps = Vec::with_capacity(n + m);
        let (mut i, mut j) = (n - 1, m - 1);
        loop {
            steps.push(WarpingStep { a: i, b: j });
            if i == 0 && j == 0 {
                break;
            }
            match dirs[i * m + j] {
                0 => {
                    i -= 1;
                    j -= 1;
                }
                1 => i -= 1,
                2 => j -= 1,
                _ => unreachable!("invalid direction byte"),
            }
        }
        steps.reverse();

        (DtwDistance::new(cost[n * m - 1]), WarpingPath::new(steps))
    }

    /// Compute pairwise DTW costs for a collection of sequences.
    ///
    /// Returns a symmetric [`DistanceMatrix`]. Pairs are computed in parallel.
    #[must_use]
    #[instrument(skip_all, fields(n = sequences.len()))]
    pub fn pairwise(&self, sequences: &[SequenceView<'_>]) -> DistanceMatrix {
        let n = sequences.len();
        let total_pairs = n * n.saturating_sub(1) / 2;

        let distances: Vec<DtwDistance> = (0..total_pairs)
            .into_par_iter()
            .map(|flat_idx| {
                // flat_idx = i*(i-1)/2 + j with i > j
                let i = ((1.0 + (1.0 + 8.0 * flat_idx as f64).sqrt()) / 2.0).floor() as usize;
                let j = flat_idx - i * (i - 1) / 2;
                self.distance(sequences[i], sequences[j])
            })
            .collect();

        DistanceMatrix::from_raw(n, distances)
    }

    /// Return the index of the medoid: the sequence with the smallest summed
    /// DTW cost to every other sequence. Ties resolve to the lowest index.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn medoid(&self, sequences: &[SequenceView<'_>]) -> Option<usize> {
        if sequences.len() <= 2 {
            return if sequences.is_empty() { None } else { Some(0) };
        }
        let matrix = self.pairwise(sequences);
        (0..sequences.len())
            .map(|i| (i, matrix.row(i).iter().map(|d| d.value()).sum::<f64>()))
            .min_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ia.cmp(ib)))
            .map(|(i, _)| i)
    }

    /// Rolling DTW with optional early abandoning.
    ///
    /// Every path visits each row once, so a row minimum above the cutoff
    /// bounds the final cost from below.
    fn rolling_cost(&self, a: SequenceView<'_>, b: SequenceView<'_>, cutoff: Option<f64>) -> f64 {
        debug_assert_eq!(a.dim(), b.dim(), "sequences must share a dimension");
        let n = a.len();
        let m = b.len();

        let mut prev = vec![f64::INFINITY; m];
        let mut curr = vec![f64::INFINITY; m];

        for i in 0..n {
            let ai = a.sample(i);
            let mut row_min = f64::INFINITY;

            for j in 0..m {
                let cost = self.metric.distance(ai, b.sample(j));
                let best = if i == 0 && j == 0 {
                    0.0
                } else {
                    let left = if j > 0 { curr[j - 1] } else { f64::INFINITY };
                    let above = if i > 0 { prev[j] } else { f64::INFINITY };
                    let diag = if i > 0 && j > 0 { prev[j - 1] } else { f64::INFINITY };
                    left.min(above).min(diag)
                };
                curr[j] = cost + best;
                row_min = row_min.min(curr[j]);
            }

            if let Some(c) = cutoff
                && i < n - 1
                && row_min > c
            {
                return f64::INFINITY;
            }

            std::mem::swap(&mut prev, &mut curr);
        }

        let final_cost = prev[m - 1];
        if let Some(c) = cutoff
            && final_cost > c
        {
            return f64::INFINITY;
        }
        final_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Sequence;

    fn uni(values: &[f64]) -> Sequence {
        Sequence::univariate(values.to_vec()).unwrap()
    }

    #[test]
    fn identical_sequences_cost_zero() {
        let dtw = Dtw::manhattan();
        let s = Sequence::from_rows(vec![vec![1.0, 2.0], vec![3.0, 1.0], vec![0.0, 0.0]]).unwrap();
        assert_eq!(dtw.distance(s.as_view(), s.as_view()).value(), 0.0);
    }

    #[test]
    fn hand_computed_2x2() {
        // a=[0,1], b=[1,0] under L1:
        // C00 = 1, C01 = 0 + 1 = 1, C10 = 0 + 1 = 1, C11 = 1 + min(1,1,1) = 2
        let dtw = Dtw::manhattan();
        let d = dtw.distance(uni(&[0.0, 1.0]).as_view(), uni(&[1.0, 0.0]).as_view());
        assert!((d.value() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn warping_absorbs_repeated_samples() {
        let dtw = Dtw::manhattan();
        let a = uni(&[0.0, 1.0, 2.0, 1.0, 0.0]);
        let b = uni(&[0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 1.0, 0.0]);
        assert_eq!(dtw.distance(a.as_view(), b.as_view()).value(), 0.0);
    }

    #[test]
    fn symmetric_and_non_negative() {
        let dtw = Dtw::manhattan();
        let a = uni(&[1.0, 5.0, 2.0, 8.0]);
        let b = uni(&[2.0, 4.0, 7.0]);
        let ab = dtw.distance(a.as_view(), b.as_view()).value();
        let ba = dtw.distance(b.as_view(), a.as_view()).value();
        assert!(ab >= 0.0);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn multivariate_sums_dimensions() {
        let dtw = Dtw::manhattan();
        let a = Sequence::from_rows(vec![vec![0.0, 0.0]]).unwrap();
        let b = Sequence::from_rows(vec![vec![1.0, -2.0]]).unwrap();
        assert!((dtw.distance(a.as_view(), b.as_view()).value() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn warping_path_endpoints_and_continuity() {
        let dtw = Dtw::manhattan();
        let a = uni(&[1.0, 5.0, 2.0, 8.0, 3.0]);
        let b = uni(&[2.0, 4.0, 7.0]);
        let (_, path) = dtw.distance_and_path(a.as_view(), b.as_view());
        let steps = path.steps();
        assert_eq!(steps.first(), Some(&WarpingStep { a: 0, b: 0 }));
        assert_eq!(steps.last(), Some(&WarpingStep { a: 4, b: 2 }));
        for pair in steps.windows(2) {
            let da = pair[1].a - pair[0].a;
            let db = pair[1].b - pair[0].b;
            assert!(da <= 1 && db <= 1 && da + db >= 1);
        }
    }

    #[test]
    fn rolling_matches_full_matrix() {
        let dtw = Dtw::manhattan();
        let a = uni(&[1.0, 3.0, 5.0, 2.0]);
        let b = uni(&[2.0, 4.0, 1.0]);
        let rolling = dtw.distance(a.as_view(), b.as_view()).value();
        let (full, _) = dtw.distance_and_path(a.as_view(), b.as_view());
        assert!((rolling - full.value()).abs() < 1e-12);
    }

    #[test]
    fn cutoff_is_exact_or_infinite() {
        let dtw = Dtw::manhattan();
        let a = uni(&[0.0, 1.0]);
        let b = uni(&[1.0, 0.0]);
        let exact = dtw.distance(a.as_view(), b.as_view()).value();
        let above = dtw.distance_with_cutoff(a.as_view(), b.as_view(), exact + 0.01);
        assert!((above.value() - exact).abs() < 1e-12);
        let below = dtw.distance_with_cutoff(a.as_view(), b.as_view(), exact - 0.01);
        assert_eq!(below, DtwDistance::INFINITY);
    }

    #[test]
    fn pairwise_matches_individual() {
        let dtw = Dtw::manhattan();
        let seqs = [uni(&[1.0, 2.0, 3.0]), uni(&[4.0, 5.0]), uni(&[1.0, 3.0, 2.0, 2.0])];
        let views: Vec<_> = seqs.iter().map(Sequence::as_view).collect();
        let matrix = dtw.pairwise(&views);
        assert_eq!(matrix.len(), 3);
        for i in 0..3 {
            for j in 0..3 {
                let direct = dtw.distance(views[i], views[j]).value();
                assert!((matrix.get(i, j).value() - direct).abs() < 1e-12, "({i}, {j})");
            }
        }
    }

    #[test]
    fn medoid_picks_most_central() {
        let dtw = Dtw::manhattan();
        let seqs = [uni(&[0.0, 0.0]), uni(&[1.0, 1.0]), uni(&[2.0, 2.0]), uni(&[10.0, 10.0])];
        let views: Vec<_> = seqs.iter().map(Sequence::as_view).collect();
        assert_eq!(dtw.medoid(&views), Some(1));
        assert_eq!(dtw.medoid(&[]), None);
        assert_eq!(dtw.medoid(&views[..1]), Some(0));
    }
}
