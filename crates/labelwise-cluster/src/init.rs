//! K-means++ initialization (private module).
//!
//! Picks initial centroid indices with probability proportional to the
//! squared DTW cost from each candidate to the nearest centroid chosen so far.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use labelwise_dtw::{DistanceMetric, Dtw, Sequence};

/// Select `k` distinct initial centroid indices from `sequences`.
///
/// The first index is uniform; each later one is drawn by D² sampling. The
/// cost computation is parallel; sampling is sequential because it needs the
/// RNG. When every remaining candidate sits at cost zero, the lowest unchosen
/// index is taken.
#[must_use]
pub(crate) fn kmeans_plus_plus<M: DistanceMetric>(
    sequences: &[Sequence],
    k: usize,
    dtw: &Dtw<M>,
    rng: &mut ChaCha8Rng,
) -> Vec<usize> {
    let n = sequences.len();
    debug_assert!(k > 0 && k <= n, "1 <= k <= n");

    let mut chosen: Vec<usize> = Vec::with_capacity(k);
    chosen.push(rng.gen_range(0..n));

    // Running minimum cost to the chosen set; chosen indices hold 0.
    let mut nearest = vec![f64::INFINITY; n];

    while chosen.len() < k {
        let last = chosen[chosen.len() - 1];
        nearest
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, slot)| {
                let d = dtw.distance(sequences[i].as_view(), sequences[last].as_view());
                *slot = slot.min(d.value());
            });
        for &c in &chosen {
            nearest[c] = 0.0;
        }

        let weights: Vec<f64> = nearest.iter().map(|d| d.powi(2)).collect();
        let total_weight: f64 = weights.iter().sum();

        let selected = if total_weight > 0.0 && total_weight.is_finite() {
            let threshold: f64 = rng.gen_range(0.0..total_weight);
            let mut cumsum = 0.0;
            let mut selected = None;
            for (i, &w) in weights.iter().enumerate() {
                cumsum += w;
                if w > 0.0 && cumsum > threshold {
                    selected = Some(i);
                    break;
                }
            }
            // Rounding can leave the walk short of the threshold.
            selected.or_else(|| weights.iter().rposition(|&w| w > 0.0))
        } else {
            None
        };

        match selected.or_else(|| (0..n).find(|i| !chosen.contains(i))) {
            Some(i) => chosen.push(i),
            None => break,
        }
    }

    chosen
}
