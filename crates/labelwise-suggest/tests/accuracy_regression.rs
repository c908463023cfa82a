//! End-to-end checks of building references and streaming suggestions.

use std::sync::Arc;
use std::sync::mpsc;

use labelwise_dtw::Sequence;
use labelwise_io::{Label, SensorDataset};
use labelwise_suggest::{
    BuilderConfig, CallbackToken, ReferenceBuilder, ReferenceLabel, SuggestError, SuggestionEvent,
    SuggestionModel, SuggestionRequest, SuggestionRun, SuggestionScheduler, distance_threshold,
};

fn bump_reference(variance: Option<f64>) -> ReferenceLabel {
    ReferenceLabel {
        class_name: "bump".into(),
        series: Sequence::univariate(vec![0.0, 1.0, 2.0, 1.0, 0.0]).unwrap(),
        variance,
        adjustments_begin: 0.0,
        adjustments_end: 0.0,
    }
}

/// One reading per second.
fn dataset_1hz(values: &[f64]) -> SensorDataset {
    let timestamps = (0..values.len()).map(|i| i as f64).collect();
    let rows = values.iter().map(|&v| vec![v]).collect();
    SensorDataset::new(timestamps, rows).unwrap()
}

fn run(model: &SuggestionModel, dataset: SensorDataset, request: SuggestionRequest) -> Vec<SuggestionEvent> {
    let mut run = SuggestionRun::new(model, Arc::new(dataset), request, Vec::new());
    run.run_to_completion();
    assert!(run.is_finished());
    run.into_sink()
}

fn candidates(events: &[SuggestionEvent]) -> Vec<Label> {
    events
        .iter()
        .flat_map(|e| match e {
            SuggestionEvent::Update(u) => u.candidates.clone(),
            SuggestionEvent::Failed { error, .. } => panic!("unexpected failure: {error}"),
        })
        .collect()
}

#[test]
fn exact_stream_fires_one_full_confidence_match() {
    assert!((distance_threshold(0.5, 1.0) - 1.177).abs() < 1e-3);

    let model = SuggestionModel::new(1.0, vec![bump_reference(Some(1.0))]);
    let events = run(&model, dataset_1hz(&[0.0, 1.0, 2.0, 1.0, 0.0]), SuggestionRequest::new(0.0, 5.0, 0.5, 3));

    let found = candidates(&events);
    assert_eq!(found.len(), 1);
    let label = &found[0];
    assert_eq!(label.class_name.as_str(), "bump");
    assert_eq!(label.timestamp_start, 0.0);
    assert_eq!(label.timestamp_end, 5.0);
    assert_eq!(label.suggestion_confidence, Some(1.0));
    assert_eq!(label.suggestion_generation, Some(3));
}

#[test]
fn chunk_size_does_not_change_candidates() {
    let pattern = [0.0, 1.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    let values: Vec<f64> = pattern.iter().copied().cycle().take(100).collect();
    let request = SuggestionRequest::new(0.0, 100.0, 0.5, 1);
    let model = SuggestionModel::new(1.0, vec![bump_reference(Some(1.0))]);

    let small = candidates(&run(&model.clone().with_chunk_budget(7), dataset_1hz(&values), request));
    let whole = candidates(&run(&model.with_chunk_budget(10_000), dataset_1hz(&values), request));

    assert!(!small.is_empty());
    assert_eq!(small, whole);
}

#[test]
fn updates_arrive_in_order_with_completion_last() {
    let values: Vec<f64> = (0..50).map(|i| (i as f64 * 0.4).sin()).collect();
    let model = SuggestionModel::new(1.0, vec![bump_reference(Some(1.0))]).with_chunk_budget(8);
    let events = run(&model, dataset_1hz(&values), SuggestionRequest::new(0.0, 40.0, 0.3, 9));

    let updates: Vec<_> = events
        .iter()
        .map(|e| match e {
            SuggestionEvent::Update(u) => u,
            SuggestionEvent::Failed { error, .. } => panic!("unexpected failure: {error}"),
        })
        .collect();
    assert_eq!(updates.len(), 6);
    for pair in updates.windows(2) {
        assert!(pair[0].progress.timestamp_completed <= pair[1].progress.timestamp_completed);
        assert!(!pair[0].completed);
    }
    let last = updates.last().unwrap();
    assert!(last.completed);
    assert!(last.candidates.is_empty());
    assert_eq!(last.progress.fraction_completed(), 1.0);
    assert!(updates.iter().all(|u| u.progress.generation == 9));
}

#[test]
fn cancelled_token_gets_no_more_chunks() {
    let values: Vec<f64> = (0..100).map(|i| (i as f64 * 0.3).cos()).collect();
    let model = SuggestionModel::new(1.0, vec![bump_reference(Some(1.0))]).with_chunk_budget(10);
    let (tx, rx) = mpsc::channel();
    let token = CallbackToken::new(42);

    let mut scheduler = SuggestionScheduler::new();
    scheduler.compute_suggestion(&model, Arc::new(dataset_1hz(&values)), SuggestionRequest::new(0.0, 90.0, 0.5, 1), token, tx);
    for _ in 0..3 {
        scheduler.step();
    }
    scheduler.cancel(token);
    scheduler.run_until_idle();

    let events: Vec<SuggestionEvent> = rx.try_iter().collect();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| matches!(e, SuggestionEvent::Update(u) if !u.completed)));
}

#[test]
fn no_enabled_references_completes_immediately() {
    let model = SuggestionModel::new(1.0, vec![bump_reference(None)]);
    let events = run(&model, dataset_1hz(&[0.0; 20]), SuggestionRequest::new(0.0, 10.0, 0.5, 4));

    assert_eq!(events.len(), 1);
    let SuggestionEvent::Update(update) = &events[0] else {
        panic!("expected an update");
    };
    assert!(update.completed);
    assert!(update.candidates.is_empty());
    assert_eq!(update.progress.confidence_histogram, None);
}

#[test]
fn invalid_confidence_goes_to_error_channel() {
    let model = SuggestionModel::new(1.0, vec![bump_reference(Some(1.0))]);
    let events = run(&model, dataset_1hz(&[0.0; 20]), SuggestionRequest::new(0.0, 10.0, 0.0, 5));

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        SuggestionEvent::Failed { generation: 5, error: SuggestError::InvalidConfidence { .. } }
    ));
}

#[test]
fn dimension_mismatch_goes_to_error_channel() {
    let model = SuggestionModel::new(1.0, vec![bump_reference(Some(1.0))]);
    let timestamps: Vec<f64> = (0..20).map(f64::from).collect();
    let rows = timestamps.iter().map(|&t| vec![t, -t]).collect();
    let dataset = SensorDataset::new(timestamps, rows).unwrap();
    let events = run(&model, dataset, SuggestionRequest::new(0.0, 10.0, 0.5, 6));

    assert!(matches!(
        events.as_slice(),
        [SuggestionEvent::Failed { error: SuggestError::DimensionMismatch { expected: 1, got: 2 }, .. }]
    ));
}

/// Three gaussian bumps of slightly different heights at 5 s, 15 s and 25 s.
fn bump_recording() -> SensorDataset {
    let timestamps: Vec<f64> = (0..=300).map(|i| i as f64 * 0.1).collect();
    let rows = timestamps
        .iter()
        .map(|&t| {
            let bump = |center: f64, height: f64| height * (-((t - center) / 0.3).powi(2)).exp();
            vec![bump(5.0, 1.0) + bump(15.0, 1.2) + bump(25.0, 1.1)]
        })
        .collect();
    SensorDataset::new(timestamps, rows).unwrap()
}

#[test]
fn built_model_finds_unlabelled_occurrence() {
    let dataset = bump_recording();
    let labels = vec![Label::new("bump", 4.0, 6.0), Label::new("bump", 14.0, 16.0)];
    let built = ReferenceBuilder::new(BuilderConfig::default())
        .unwrap()
        .build(&dataset, &labels)
        .unwrap();
    assert!((built.sample_rate - 50.0).abs() < 1e-12);
    assert_eq!(built.references.len(), 1);
    assert!(built.references[0].variance.unwrap() > 0.0);

    let model = built.into_model();
    let events = run(&model, dataset, SuggestionRequest::new(0.0, 30.0, 0.5, 1));
    let found = candidates(&events);

    let third = found
        .iter()
        .find(|l| l.timestamp_start > 20.0)
        .expect("third bump suggested");
    assert_eq!(third.class_name.as_str(), "bump");
    assert!(third.timestamp_start < 25.0 && third.timestamp_end > 25.0);
    assert!((third.timestamp_start - 24.0).abs() < 1.0);
    assert!((third.timestamp_end - 26.0).abs() < 1.0);
    let confidence = third.suggestion_confidence.unwrap();
    assert!(confidence >= 0.5 && confidence <= 1.0);
}
