//! Gaussian-shaped confidence scoring of match distances.

/// Number of buckets in a confidence histogram.
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Distance below which a match reaches `confidence` for a reference with
/// the given variance: `sqrt(-2 ln(confidence)) * variance`.
///
/// `confidence` must be in `(0, 1]`; a confidence of 1 yields 0.
#[must_use]
pub fn distance_threshold(confidence: f64, variance: f64) -> f64 {
    (-2.0 * confidence.ln()).max(0.0).sqrt() * variance
}

/// Confidence of a match at `distance`: `exp(-d^2 / (2 variance^2))`.
///
/// With zero variance only an exact match (`distance == 0`) scores 1;
/// anything else scores 0.
#[must_use]
pub fn likelihood(variance: f64, distance: f64) -> f64 {
    if variance == 0.0 {
        return if distance == 0.0 { 1.0 } else { 0.0 };
    }
    (-distance * distance / (variance * variance) / 2.0).exp()
}

/// Histogram bucket for a confidence: `floor(confidence^0.3 * 9)`, clamped
/// to the bucket range. The exponent spreads high confidences apart.
#[must_use]
pub fn histogram_bucket(confidence: f64) -> usize {
    let raw = (confidence.max(0.0).powf(0.3) * (HISTOGRAM_BUCKETS - 1) as f64).floor();
    if raw.is_nan() {
        return 0;
    }
    (raw as usize).min(HISTOGRAM_BUCKETS - 1)
}
