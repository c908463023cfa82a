//! DTW alignment cost newtype.

use std::cmp::Ordering;
use std::fmt;

/// Accumulated DTW alignment cost: the sum of per-sample metric distances
/// along the optimal warping path. Non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct DtwDistance(f64);

impl DtwDistance {
    /// Cost of aligning a sequence with itself.
    pub const ZERO: Self = Self(0.0);

    /// Sentinel for unreachable alignments.
    pub const INFINITY: Self = Self(f64::INFINITY);

    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw cost.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Return true unless the alignment was unreachable.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Total ordering comparison using [`f64::total_cmp`].
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<DtwDistance> for f64 {
    fn from(d: DtwDistance) -> Self {
        d.0
    }
}

impl fmt::Display for DtwDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", DtwDistance::new(0.5)), "0.500000");
    }

    #[test]
    fn ordering_is_total() {
        let a = DtwDistance::new(1.0);
        let b = DtwDistance::new(2.0);
        assert_eq!(a.total_cmp(&b), Ordering::Less);
        assert_eq!(DtwDistance::INFINITY.total_cmp(&b), Ordering::Greater);
    }

    #[test]
    fn sentinels() {
        assert_eq!(f64::from(DtwDistance::ZERO), 0.0);
        assert!(!DtwDistance::INFINITY.is_finite());
    }
}
