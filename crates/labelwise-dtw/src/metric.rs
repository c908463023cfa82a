//! Per-sample distance metrics and their matching averaging rule.
//!
//! Every metric treats NaN as a missing dimension: a dimension where either
//! side is NaN contributes nothing to a distance, and NaN entries are left
//! out of an average.

/// A scalar distance between two samples of equal dimension, paired with the
/// averaging rule DBA uses to collapse aligned samples into one.
///
/// Algorithms are generic over `M: DistanceMetric` so the inner DTW loop is
/// monomorphized.
pub trait DistanceMetric: Clone + Send + Sync {
    /// Distance between two samples. Must be non-negative and symmetric.
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;

    /// Average a non-empty set of samples into `out`.
    ///
    /// `out.len()` is the sample dimension.
    fn average(&self, points: &[&[f64]], out: &mut [f64]) {
        element_wise_mean(points, out);
    }
}

/// Sum of absolute per-dimension differences (L1). The engine's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Manhattan;

impl DistanceMetric for Manhattan {
    #[inline]
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .filter(|d| !d.is_nan())
            .sum()
    }
}

/// Element-wise mean over the non-NaN entries of each dimension.
///
/// A dimension with no finite entry stays NaN.
fn element_wise_mean(points: &[&[f64]], out: &mut [f64]) {
    for (d, slot) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        let mut count = 0usize;
        for p in points {
            let v = p[d];
            if !v.is_nan() {
                sum += v;
                count += 1;
            }
        }
        *slot = if count > 0 { sum / count as f64 } else { f64::NAN };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_sums_absolute_differences() {
        let d = Manhattan.distance(&[0.0, 1.0, -2.0], &[1.0, 1.0, 2.0]);
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn manhattan_skips_missing_dimensions() {
        let d = Manhattan.distance(&[f64::NAN, 1.0], &[3.0, 4.0]);
        assert!((d - 3.0).abs() < 1e-12);
        let all_missing = Manhattan.distance(&[f64::NAN], &[f64::NAN]);
        assert_eq!(all_missing, 0.0);
    }

    #[test]
    fn distances_are_symmetric() {
        let a = [0.3, -1.2, 4.0];
        let b = [1.1, 0.0, -2.5];
        assert_eq!(Manhattan.distance(&a, &b), Manhattan.distance(&b, &a));
    }

    #[test]
    fn mean_ignores_nan_entries() {
        let a = [1.0, f64::NAN];
        let b = [3.0, f64::NAN];
        let c = [5.0, 2.0];
        let mut out = [0.0; 2];
        Manhattan.average(&[&a, &b, &c], &mut out);
        assert!((out[0] - 3.0).abs() < 1e-12);
        assert!((out[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn mean_of_all_missing_is_nan() {
        let a = [f64::NAN];
        let mut out = [0.0];
        element_wise_mean(&[&a], &mut out);
        assert!(out[0].is_nan());
    }
}
