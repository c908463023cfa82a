//! Result types for DTW K-means clustering.

use std::cmp::Ordering;
use std::fmt;

use labelwise_dtw::Sequence;

/// A cluster assignment label. Wraps a zero-based cluster index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterLabel(usize);

impl ClusterLabel {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based cluster index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sum of squared DTW costs from each sequence to its assigned centroid.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Inertia(f64);

impl Inertia {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw inertia value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Total ordering comparison using [`f64::total_cmp`].
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Inertia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Summary of one cluster.
#[derive(Debug, Clone)]
pub struct Prototype {
    /// DBA centroid of the cluster.
    pub mean: Sequence,
    /// Mean DTW cost from each member to `mean`. `None` when the cluster
    /// ended up with no members.
    pub variance: Option<f64>,
}

/// Result of a K-means clustering run.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster assignment for each input sequence.
    pub assignments: Vec<ClusterLabel>,
    /// One prototype per cluster, indexed by [`ClusterLabel::index`].
    pub prototypes: Vec<Prototype>,
    /// Total inertia of the final assignment.
    pub inertia: Inertia,
    /// Whether centroid movement fell below the tolerance.
    pub converged: bool,
    /// Number of assign/update rounds performed.
    pub iterations: usize,
}

impl KMeansResult {
    /// Return the number of sequences assigned to each cluster.
    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.prototypes.len()];
        for label in &self.assignments {
            sizes[label.index()] += 1;
        }
        sizes
    }
}
