//! Core K-means algorithm implementation.
//!
//! Provides the assign/update loop and the final prototype summary.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use labelwise_dtw::{DbaConfig, DistanceMetric, Dtw, Sequence, SequenceView};

use crate::config::KMeansConfig;
use crate::error::ClusterError;
use crate::init::kmeans_plus_plus;
use crate::result::{ClusterLabel, Inertia, KMeansResult, Prototype};

// ── assign ────────────────────────────────────────────────────────────────────

/// Assign each sequence to its nearest centroid.
///
/// Returns the label and DTW cost per sequence. Ties go to the lowest
/// centroid index. Later centroids are abandoned early once they cannot
/// beat the best cost so far.
#[instrument(level = "debug", skip_all, fields(n = sequences.len(), k = centroids.len()))]
pub(crate) fn assign<M: DistanceMetric>(
    sequences: &[Sequence],
    centroids: &[Sequence],
    dtw: &Dtw<M>,
) -> Vec<(ClusterLabel, f64)> {
    sequences
        .par_iter()
        .map(|s| {
            let view = s.as_view();
            let mut best_label = 0usize;
            let mut best_dist = f64::INFINITY;
            for (c_idx, centroid) in centroids.iter().enumerate() {
                let d = if best_dist.is_finite() {
                    dtw.distance_with_cutoff(view, centroid.as_view(), best_dist)
                } else {
                    dtw.distance(view, centroid.as_view())
                };
                if d.value() < best_dist {
                    best_dist = d.value();
                    best_label = c_idx;
                }
            }
            (ClusterLabel::new(best_label), best_dist)
        })
        .collect()
}

// ── update ────────────────────────────────────────────────────────────────────

/// Recompute each centroid by DBA over its members, starting from the
/// previous centroid. A cluster without members keeps its previous centroid.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ClusterError::Dba`] | DBA centroid computation fails |
#[instrument(level = "debug", skip_all, fields(k = prev_centroids.len()))]
pub(crate) fn update<M: DistanceMetric>(
    sequences: &[Sequence],
    assignments: &[(ClusterLabel, f64)],
    prev_centroids: &[Sequence],
    dba_config: &DbaConfig,
    dtw: &Dtw<M>,
) -> Result<Vec<Sequence>, ClusterError> {
    let mut groups: Vec<Vec<SequenceView<'_>>> = vec![Vec::new(); prev_centroids.len()];
    for (s, (label, _)) in sequences.iter().zip(assignments) {
        groups[label.index()].push(s.as_view());
    }

    groups
        .par_iter()
        .zip(prev_centroids.par_iter())
        .enumerate()
        .map(|(c, (members, prev))| {
            if members.is_empty() {
                debug!(cluster = c, "cluster has no members, keeping previous centroid");
                return Ok(prev.clone());
            }
            dba_config
                .average_from(dtw, members, prev.as_view())
                .map(|r| r.centroid)
                .map_err(ClusterError::from)
        })
        .collect()
}

// ── run ───────────────────────────────────────────────────────────────────────

/// Run seeded K-means and summarize each cluster.
///
/// # Errors
///
/// Propagates [`ClusterError`] from the update step.
#[instrument(skip_all, fields(n = sequences.len(), k = config.k, seed = config.seed))]
pub(crate) fn run<M: DistanceMetric>(
    sequences: &[Sequence],
    config: &KMeansConfig,
    dtw: &Dtw<M>,
) -> Result<KMeansResult, ClusterError> {
    let dba_config = DbaConfig::new().with_max_iter(config.dba_max_iter);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let init_indices = kmeans_plus_plus(sequences, config.k, dtw, &mut rng);
    let mut centroids: Vec<Sequence> = init_indices.iter().map(|&i| sequences[i].clone()).collect();

    let mut converged = false;
    let mut iterations = 0usize;

    for iteration in 0..config.max_iter {
        iterations = iteration + 1;

        let assignments = assign(sequences, &centroids, dtw);
        let new_centroids = update(sequences, &assignments, &centroids, &dba_config, dtw)?;

        let movement: f64 = centroids
            .iter()
            .zip(&new_centroids)
            .map(|(old, new)| dtw.distance(old.as_view(), new.as_view()).value())
            .sum();
        centroids = new_centroids;

        debug!(iteration, movement, "iteration complete");

        if movement < config.tol {
            converged = true;
            break;
        }
    }

    let assignments = assign(sequences, &centroids, dtw);

    let mut sums = vec![0.0_f64; config.k];
    let mut counts = vec![0usize; config.k];
    let mut inertia = 0.0_f64;
    for (label, d) in &assignments {
        sums[label.index()] += d;
        counts[label.index()] += 1;
        inertia += d.powi(2);
    }

    let prototypes: Vec<Prototype> = centroids
        .into_iter()
        .enumerate()
        .map(|(c, mean)| Prototype {
            mean,
            variance: (counts[c] > 0).then(|| sums[c] / counts[c] as f64),
        })
        .collect();

    info!(iterations, inertia, converged, "k-means complete");

    Ok(KMeansResult {
        assignments: assignments.into_iter().map(|(label, _)| label).collect(),
        prototypes,
        inertia: Inertia::new(inertia),
        converged,
        iterations,
    })
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use labelwise_dtw::{DbaConfig, Dtw, Sequence};

    use super::{assign, update};
    use crate::config::KMeansConfig;
    use crate::result::ClusterLabel;

    fn uni(values: &[f64]) -> Sequence {
        Sequence::univariate(values.to_vec()).unwrap()
    }

    /// Nine sequences in three tight groups near 0, 5 and 10.
    fn three_groups() -> Vec<Sequence> {
        vec![
            uni(&[0.0, 0.0, 0.0, 0.0]),
            uni(&[0.1, 0.0, 0.0, 0.0]),
            uni(&[0.0, 0.1, 0.0, 0.0]),
            uni(&[5.0, 5.0, 5.0, 5.0]),
            uni(&[5.1, 5.0, 5.0, 5.0]),
            uni(&[5.0, 5.1, 5.0, 5.0]),
            uni(&[10.0, 10.0, 10.0, 10.0]),
            uni(&[10.1, 10.0, 10.0, 10.0]),
            uni(&[10.0, 10.1, 10.0, 10.0]),
        ]
    }

    #[test]
    fn assign_picks_nearest_with_low_index_ties() {
        let seqs = vec![uni(&[0.0]), uni(&[2.0]), uni(&[1.0])];
        let centroids = vec![uni(&[0.0]), uni(&[2.0])];
        let labels: Vec<usize> = assign(&seqs, &centroids, &Dtw::manhattan())
            .iter()
            .map(|(l, _)| l.index())
            .collect();
        assert_eq!(labels, vec![0, 1, 0]);
    }

    #[test]
    fn update_keeps_empty_cluster_centroid() {
        let seqs = vec![uni(&[1.0, 1.0]), uni(&[3.0, 3.0])];
        let prev = vec![uni(&[2.0, 2.0]), uni(&[100.0])];
        let assignments = vec![(ClusterLabel::new(0), 2.0), (ClusterLabel::new(0), 2.0)];
        let next = update(&seqs, &assignments, &prev, &DbaConfig::new(), &Dtw::manhattan()).unwrap();
        assert_eq!(next[0].as_flat(), &[2.0, 2.0]);
        assert_eq!(next[1].as_flat(), &[100.0]);
    }

    #[test]
    fn single_exemplar_is_its_own_prototype() {
        let exemplar = Sequence::from_rows(vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![1.0, 0.0]]).unwrap();
        let result = KMeansConfig::new(1).unwrap().fit(std::slice::from_ref(&exemplar)).unwrap();
        assert_eq!(result.prototypes.len(), 1);
        assert_eq!(result.prototypes[0].mean.as_flat(), exemplar.as_flat());
        assert_eq!(result.prototypes[0].variance, Some(0.0));
        assert!(result.converged);
    }

    #[test]
    fn three_well_separated_groups() {
        let seqs = three_groups();
        let result = KMeansConfig::new(3).unwrap().fit(&seqs).unwrap();

        assert_eq!(result.cluster_sizes(), vec![3, 3, 3]);
        for group in [[0usize, 1, 2], [3, 4, 5], [6, 7, 8]] {
            let label = result.assignments[group[0]];
            assert!(group.iter().all(|&i| result.assignments[i] == label));
        }
        for p in &result.prototypes {
            let v = p.variance.unwrap();
            assert!(v >= 0.0 && v < 0.2, "variance {v}");
        }
    }

    #[test]
    fn identical_sequences_zero_inertia() {
        let seqs = vec![uni(&[1.0, 2.0, 3.0]); 3];
        let result = KMeansConfig::new(1).unwrap().fit(&seqs).unwrap();
        assert!(result.inertia.value() < 1e-10);
        assert_eq!(result.prototypes[0].variance, Some(0.0));
    }

    #[test]
    fn deterministic_results() {
        let seqs = three_groups();
        let cfg = KMeansConfig::new(3).unwrap().with_seed(99);
        let r1 = cfg.fit(&seqs).unwrap();
        let r2 = cfg.fit(&seqs).unwrap();
        assert_eq!(r1.assignments, r2.assignments);
        assert_eq!(r1.inertia.value(), r2.inertia.value());
    }

    #[test]
    fn max_iter_respected() {
        let seqs = three_groups();
        let result = KMeansConfig::new(3).unwrap().with_max_iter(1).fit(&seqs).unwrap();
        assert!(result.iterations <= 1);
        assert_eq!(result.assignments.len(), 9);
    }

    #[test]
    fn variable_length_members() {
        let seqs = vec![
            uni(&[0.0, 1.0, 2.0, 1.0, 0.0]),
            uni(&[0.0, 1.0, 1.0, 2.0, 1.0, 0.0]),
            uni(&[0.0, 2.0, 1.0, 0.0]),
        ];
        let result = KMeansConfig::new(1).unwrap().fit(&seqs).unwrap();
        let v = result.prototypes[0].variance.unwrap();
        assert!(v.is_finite() && v >= 0.0);
        assert_eq!(result.cluster_sizes(), vec![3]);
    }
}
