//! Stream-level regression tests for labelwise-spring.
//!
//! Multivariate streams with planted, time-warped occurrences of the
//! references; checks what fires and where.

use labelwise_dtw::{Dtw, Sequence};
use labelwise_spring::{BestMatchMatcher, MatchResult, SpringMatcher, SpringReference};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Two-axis gesture: a rise on axis 0 while axis 1 dips.
fn gesture(len: usize, scale: f64) -> Vec<Vec<f64>> {
    (0..len)
        .map(|i| {
            let phase = std::f64::consts::PI * i as f64 / (len - 1) as f64;
            vec![scale * phase.sin(), -scale * 0.5 * phase.sin()]
        })
        .collect()
}

fn rest(len: usize) -> Vec<Vec<f64>> {
    vec![vec![0.0, 0.0]; len]
}

fn reference(rows: Vec<Vec<f64>>, threshold: f64) -> SpringReference {
    let len = rows.len();
    SpringReference::with_length_bounds(
        Sequence::from_rows(rows).expect("valid reference"),
        threshold,
        (len * 4).div_ceil(5),
        len * 6 / 5,
    )
    .expect("valid bounds")
}

fn run_stream(matcher: &mut SpringMatcher, stream: &[Vec<f64>]) -> Vec<MatchResult> {
    let mut fired = Vec::new();
    for sample in stream {
        matcher.feed(sample, |m| fired.push(m)).expect("matching dimension");
    }
    matcher.flush(|m| fired.push(m));
    fired
}

// ---------------------------------------------------------------------------
// a) warped_occurrences_are_found
// ---------------------------------------------------------------------------

#[test]
fn warped_occurrences_are_found() {
    let mut stream = rest(10);
    stream.extend(gesture(18, 2.0));
    stream.extend(rest(12));
    stream.extend(gesture(23, 2.0));
    stream.extend(rest(10));

    let mut matcher = SpringMatcher::new(vec![reference(gesture(20, 2.0), 3.0)]).unwrap();
    let fired = run_stream(&mut matcher, &stream);

    assert_eq!(fired.len(), 2, "{fired:?}");
    assert!(fired[0].start_index >= 8 && fired[0].end_index <= 29, "{:?}", fired[0]);
    assert!(fired[1].start_index >= 38 && fired[1].end_index <= 62, "{:?}", fired[1]);
    assert!(fired.iter().all(|m| m.distance <= 3.0));
}

// ---------------------------------------------------------------------------
// b) reported_distance_is_dtw_of_span
// ---------------------------------------------------------------------------

/// The reported cost equals plain DTW between the reference and the span.
#[test]
fn reported_distance_is_dtw_of_span() {
    let reference_rows = gesture(12, 1.5);
    let mut stream = rest(5);
    stream.extend(gesture(13, 1.4));
    stream.extend(rest(5));

    let mut matcher = SpringMatcher::new(vec![reference(reference_rows.clone(), 10.0)]).unwrap();
    let fired = run_stream(&mut matcher, &stream);
    assert_eq!(fired.len(), 1, "{fired:?}");

    let m = fired[0];
    let span = Sequence::from_rows(stream[m.start_index..=m.end_index].to_vec()).unwrap();
    let reference_seq = Sequence::from_rows(reference_rows).unwrap();
    let direct = Dtw::manhattan().distance(reference_seq.as_view(), span.as_view()).value();
    assert!((direct - m.distance).abs() < 1e-9, "{direct} vs {}", m.distance);
}

// ---------------------------------------------------------------------------
// c) each_reference_reports_its_own_gesture
// ---------------------------------------------------------------------------

#[test]
fn each_reference_reports_its_own_gesture() {
    let small = gesture(10, 1.0);
    let large = gesture(10, 5.0);
    let mut stream = rest(6);
    stream.extend(large.clone());
    stream.extend(rest(6));
    stream.extend(small.clone());
    stream.extend(rest(6));

    let mut matcher =
        SpringMatcher::new(vec![reference(small, 0.5), reference(large, 0.5)]).unwrap();
    let fired = run_stream(&mut matcher, &stream);

    assert_eq!(fired.len(), 2, "{fired:?}");
    assert_eq!(fired[0].reference_index, 1);
    assert_eq!(fired[1].reference_index, 0);
}

// ---------------------------------------------------------------------------
// d) best_match_agrees_with_streaming
// ---------------------------------------------------------------------------

#[test]
fn best_match_agrees_with_streaming() {
    let reference_rows = gesture(15, 2.0);
    let mut stream = rest(7);
    stream.extend(gesture(15, 2.0));
    stream.extend(rest(7));

    let mut streaming = SpringMatcher::new(vec![reference(reference_rows.clone(), 1.0)]).unwrap();
    let fired = run_stream(&mut streaming, &stream);

    let mut offline = BestMatchMatcher::new(vec![reference(reference_rows, f64::INFINITY)]).unwrap();
    offline
        .feed_all(stream.iter().map(Vec::as_slice))
        .unwrap();
    let best = offline.best_match().unwrap();

    assert_eq!(fired.len(), 1);
    assert_eq!(best.distance, fired[0].distance);
    assert_eq!(best.end_index, fired[0].end_index);
}
