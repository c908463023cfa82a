//! Accuracy regression tests for labelwise-cluster.
//!
//! Checks clustering quality on small gesture-like datasets whose members
//! differ in length and phase.

use labelwise_cluster::{KMeansConfig, KMeansResult};
use labelwise_dtw::{Dtw, Sequence};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A two-axis bump of `len` samples with peak height `peak` on axis 0 and
/// a constant `level` on axis 1.
fn bump(len: usize, peak: f64, level: f64) -> Sequence {
    let rows = (0..len)
        .map(|i| {
            let phase = std::f64::consts::PI * i as f64 / (len - 1) as f64;
            vec![peak * phase.sin(), level]
        })
        .collect();
    Sequence::from_rows(rows).expect("valid bump")
}

fn members_of(result: &KMeansResult, cluster: usize) -> Vec<usize> {
    (0..result.assignments.len())
        .filter(|&i| result.assignments[i].index() == cluster)
        .collect()
}

fn gesture_data() -> Vec<Sequence> {
    vec![
        bump(20, 1.0, 0.0),
        bump(24, 1.0, 0.0),
        bump(18, 1.05, 0.0),
        bump(22, 4.0, 3.0),
        bump(19, 4.1, 3.0),
        bump(25, 3.9, 3.0),
    ]
}

// ---------------------------------------------------------------------------
// a) gestures_split_by_shape
// ---------------------------------------------------------------------------

#[test]
fn gestures_split_by_shape() {
    let data = gesture_data();
    let result = KMeansConfig::new(2).unwrap().fit(&data).unwrap();

    assert_eq!(result.cluster_sizes(), vec![3, 3]);
    let first = result.assignments[0];
    let second = result.assignments[3];
    assert_ne!(first, second);
    assert_eq!(&result.assignments[..3], &[first; 3]);
    assert_eq!(&result.assignments[3..], &[second; 3]);
}

// ---------------------------------------------------------------------------
// b) prototype_length_follows_a_member
// ---------------------------------------------------------------------------

/// DBA keeps the length of the centroid it starts from, which is always a
/// member chosen by k-means++.
#[test]
fn prototype_length_follows_a_member() {
    let data = gesture_data();
    let result = KMeansConfig::new(2).unwrap().fit(&data).unwrap();
    for (c, prototype) in result.prototypes.iter().enumerate() {
        let lengths: Vec<usize> = members_of(&result, c).iter().map(|&i| data[i].len()).collect();
        assert!(lengths.contains(&prototype.mean.len()), "cluster {c}");
        assert_eq!(prototype.mean.dim(), 2);
    }
}

// ---------------------------------------------------------------------------
// c) variance_is_mean_member_cost
// ---------------------------------------------------------------------------

#[test]
fn variance_is_mean_member_cost() {
    let data = gesture_data();
    let dtw = Dtw::manhattan();
    let result = KMeansConfig::new(2).unwrap().fit_with(&dtw, &data).unwrap();

    for (c, prototype) in result.prototypes.iter().enumerate() {
        let members = members_of(&result, c);
        let mean_cost: f64 = members
            .iter()
            .map(|&i| dtw.distance(data[i].as_view(), prototype.mean.as_view()).value())
            .sum::<f64>()
            / members.len() as f64;
        let variance = prototype.variance.unwrap();
        assert!((variance - mean_cost).abs() < 1e-9, "cluster {c}: {variance} vs {mean_cost}");
    }
}
