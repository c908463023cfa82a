//! Configuration builder for DTW K-means.

use labelwise_dtw::{DistanceMetric, Dtw, Manhattan, Sequence};

use crate::error::ClusterError;
use crate::result::KMeansResult;

/// Configuration for DTW K-means clustering.
///
/// Construct via [`KMeansConfig::new`], then chain `with_*` methods to override defaults.
///
/// # Defaults
///
/// | Parameter      | Default |
/// |----------------|---------|
/// | `max_iter`     | 10      |
/// | `dba_max_iter` | 10      |
/// | `tol`          | 0.01    |
/// | `seed`         | 42      |
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    pub(crate) k: usize,
    pub(crate) max_iter: usize,
    pub(crate) dba_max_iter: usize,
    pub(crate) tol: f64,
    pub(crate) seed: u64,
}

impl KMeansConfig {
    /// Create a new K-means configuration with the given cluster count.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ClusterError::InvalidK`] | `k` is zero |
    pub fn new(k: usize) -> Result<Self, ClusterError> {
        if k == 0 {
            return Err(ClusterError::InvalidK { k });
        }
        Ok(Self {
            k,
            max_iter: 10,
            dba_max_iter: 10,
            tol: 0.01,
            seed: 42,
        })
    }

    /// Set the maximum number of assign/update rounds.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of DBA iterations run per centroid update.
    #[must_use]
    pub fn with_dba_max_iter(mut self, dba_max_iter: usize) -> Self {
        self.dba_max_iter = dba_max_iter;
        self
    }

    /// Set the convergence tolerance. Iteration stops when the summed DTW
    /// cost between old and new centroids falls below this value.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the random seed used for k-means++ initialization.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of clusters.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Return the maximum number of assign/update rounds.
    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Return the number of DBA iterations per centroid update.
    #[must_use]
    pub fn dba_max_iter(&self) -> usize {
        self.dba_max_iter
    }

    /// Return the convergence tolerance.
    #[must_use]
    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Cluster `sequences` under the [`Manhattan`] sample metric.
    ///
    /// # Errors
    ///
    /// See [`KMeansConfig::fit_with`].
    pub fn fit(&self, sequences: &[Sequence]) -> Result<KMeansResult, ClusterError> {
        self.fit_with(&Dtw::<Manhattan>::default(), sequences)
    }

    /// Cluster `sequences` with the given DTW calculator.
    ///
    /// Sequences may differ in length but must share a sample dimension.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ClusterError::TooFewSequences`] | `sequences.len() < k` |
    /// | [`ClusterError::DimensionMismatch`] | Sequences differ in sample dimension |
    /// | [`ClusterError::Dba`] | A DBA centroid update fails |
    pub fn fit_with<M: DistanceMetric>(
        &self,
        dtw: &Dtw<M>,
        sequences: &[Sequence],
    ) -> Result<KMeansResult, ClusterError> {
        let n = sequences.len();
        if n < self.k {
            return Err(ClusterError::TooFewSequences {
                n_sequences: n,
                k: self.k,
            });
        }
        let expected = sequences[0].dim();
        if let Some((index, s)) = sequences.iter().enumerate().find(|(_, s)| s.dim() != expected) {
            return Err(ClusterError::DimensionMismatch {
                index,
                expected,
                got: s.dim(),
            });
        }
        crate::kmeans::run(sequences, self, dtw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = KMeansConfig::new(2).unwrap();
        assert_eq!(cfg.k(), 2);
        assert_eq!(cfg.max_iter(), 10);
        assert_eq!(cfg.dba_max_iter(), 10);
        assert!((cfg.tol() - 0.01).abs() < f64::EPSILON);
        assert_eq!(cfg.seed(), 42);
    }

    #[test]
    fn builders_override() {
        let cfg = KMeansConfig::new(1)
            .unwrap()
            .with_max_iter(3)
            .with_dba_max_iter(4)
            .with_tol(0.5)
            .with_seed(7);
        assert_eq!(cfg.max_iter(), 3);
        assert_eq!(cfg.dba_max_iter(), 4);
        assert!((cfg.tol() - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.seed(), 7);
    }

    #[test]
    fn zero_k_rejected() {
        assert!(matches!(KMeansConfig::new(0), Err(ClusterError::InvalidK { k: 0 })));
    }

    #[test]
    fn too_few_sequences() {
        let s = Sequence::univariate(vec![1.0]).unwrap();
        let err = KMeansConfig::new(2).unwrap().fit(&[s]).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::TooFewSequences { n_sequences: 1, k: 2 }
        ));
    }

    #[test]
    fn mixed_dimensions_rejected() {
        let a = Sequence::univariate(vec![1.0, 2.0]).unwrap();
        let b = Sequence::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        let err = KMeansConfig::new(1).unwrap().fit(&[a, b]).unwrap_err();
        assert!(matches!(err, ClusterError::DimensionMismatch { index: 1, .. }));
    }
}
