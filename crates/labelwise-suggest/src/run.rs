//! One resumable suggestion computation.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use labelwise_io::{ClassName, Label, ResampleWindow, SuggestionProgress};
use labelwise_spring::{MatchResult, SpringMatcher, SpringReference};

use crate::config::{length_window, SuggestionRequest};
use crate::error::SuggestError;
use crate::likelihood::{distance_threshold, histogram_bucket, likelihood, HISTOGRAM_BUCKETS};
use crate::model::{ReferenceLabel, SuggestionModel};

/// Accepted match length around each reference's length.
const MATCH_LENGTH_TOLERANCE: (f64, f64) = (0.8, 1.2);

/// One delivery from a running computation.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionUpdate {
    /// Candidates found since the previous update.
    pub candidates: Vec<Label>,
    /// Progress of the computation.
    pub progress: SuggestionProgress,
    /// True only on the last update of a computation.
    pub completed: bool,
}

/// Receives the output of a suggestion computation.
///
/// Updates of one computation arrive in increasing `timestamp_completed`
/// with the `completed` update last. A failure ends the computation; no
/// update follows it.
pub trait SuggestionSink {
    /// Called after every processed chunk, and once more on completion.
    fn on_update(&mut self, update: SuggestionUpdate);

    /// Called once when the computation fails.
    fn on_error(&mut self, generation: u64, error: SuggestError);
}

/// Everything a sink can receive, for channel- and buffer-backed sinks.
#[derive(Debug)]
pub enum SuggestionEvent {
    /// A chunk or completion update.
    Update(SuggestionUpdate),
    /// The computation failed.
    Failed {
        /// Generation of the failed request.
        generation: u64,
        /// What went wrong.
        error: SuggestError,
    },
}

impl SuggestionSink for Vec<SuggestionEvent> {
    fn on_update(&mut self, update: SuggestionUpdate) {
        self.push(SuggestionEvent::Update(update));
    }

    fn on_error(&mut self, generation: u64, error: SuggestError) {
        self.push(SuggestionEvent::Failed { generation, error });
    }
}

/// Events sent after the receiver hung up are dropped.
impl SuggestionSink for Sender<SuggestionEvent> {
    fn on_update(&mut self, update: SuggestionUpdate) {
        let _ = self.send(SuggestionEvent::Update(update));
    }

    fn on_error(&mut self, generation: u64, error: SuggestError) {
        let _ = self.send(SuggestionEvent::Failed { generation, error });
    }
}

impl<S: SuggestionSink + ?Sized> SuggestionSink for Box<S> {
    fn on_update(&mut self, update: SuggestionUpdate) {
        (**self).on_update(update);
    }

    fn on_error(&mut self, generation: u64, error: SuggestError) {
        (**self).on_error(generation, error);
    }
}

/// Whether a computation has more chunks to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Call [`SuggestionRun::resume`] again.
    Pending,
    /// The completion update or an error has been delivered.
    Finished,
}

/// Per-reference data a run needs to turn matches into labels.
#[derive(Debug, Clone)]
struct ActiveReference {
    class_name: ClassName,
    variance: f64,
    adjustments_begin: f64,
    adjustments_end: f64,
}

#[derive(Debug)]
struct Streaming {
    matcher: SpringMatcher,
    references: Vec<ActiveReference>,
    start: f64,
    end: f64,
    n_samples: usize,
    step: f64,
    chunk_len: usize,
    next_index: usize,
    histogram: [u32; HISTOGRAM_BUCKETS],
}

#[derive(Debug)]
enum Phase {
    Idle,
    Streaming(Box<Streaming>),
    Done,
}

/// A suggestion computation that advances one chunk per
/// [`resume`](SuggestionRun::resume) call.
///
/// The run owns a fresh matcher; the dataset is shared read-only. Nothing
/// happens until the first `resume`, which validates the request and
/// processes the first chunk.
#[derive(Debug)]
pub struct SuggestionRun<D, S> {
    dataset: Arc<D>,
    sink: S,
    request: SuggestionRequest,
    sample_rate: f64,
    chunk_budget: usize,
    references: Vec<ReferenceLabel>,
    phase: Phase,
}

impl<D: ResampleWindow, S: SuggestionSink> SuggestionRun<D, S> {
    /// Prepare a computation of `request` over `dataset` with the enabled
    /// references of `model`, reporting to `sink`.
    pub fn new(model: &SuggestionModel, dataset: Arc<D>, request: SuggestionRequest, sink: S) -> Self {
        Self {
            dataset,
            sink,
            request,
            sample_rate: model.sample_rate(),
            chunk_budget: model.chunk_budget(),
            references: model.active_references().cloned().collect(),
            phase: Phase::Idle,
        }
    }

    /// True once the completion update or an error has been delivered.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// Consume the run and return the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Process one chunk and deliver its update.
    ///
    /// Failures go to [`SuggestionSink::on_error`] and finish the run.
    pub fn resume(&mut self) -> RunState {
        let phase = std::mem::replace(&mut self.phase, Phase::Done);
        let outcome = match phase {
            Phase::Idle => self.start().and_then(|streaming| match streaming {
                Some(mut s) => self.process_chunk(&mut s).map(|more| more.then_some(s)),
                None => Ok(None),
            }),
            Phase::Streaming(mut s) => self.process_chunk(&mut s).map(|more| more.then_some(s)),
            Phase::Done => return RunState::Finished,
        };

        match outcome {
            Ok(Some(s)) => {
                self.phase = Phase::Streaming(s);
                RunState::Pending
            }
            Ok(None) => RunState::Finished,
            Err(error) => {
                warn!(generation = self.request.generation, %error, "suggestion run failed");
                self.sink.on_error(self.request.generation, error);
                RunState::Finished
            }
        }
    }

    /// Resume until finished.
    pub fn run_to_completion(&mut self) {
        while self.resume() == RunState::Pending {}
    }

    /// Validate the request and set up the matcher. `None` means the
    /// completion update has already been delivered.
    #[instrument(skip(self), fields(generation = self.request.generation))]
    fn start(&mut self) -> Result<Option<Box<Streaming>>, SuggestError> {
        self.request.validate()?;

        let start = snap(self.sample_rate, self.request.timestamp_start);
        let end = snap(self.sample_rate, self.request.timestamp_end);
        let n_samples = (self.sample_rate * (end - start)).round();
        if !(n_samples >= 1.0) {
            return Err(SuggestError::InvalidRange {
                start: self.request.timestamp_start,
                end: self.request.timestamp_end,
            });
        }
        let n_samples = n_samples as usize;

        if self.references.is_empty() {
            info!("no enabled references, nothing to suggest");
            self.sink.on_update(SuggestionUpdate {
                candidates: Vec::new(),
                progress: SuggestionProgress {
                    timestamp_start: start,
                    timestamp_end: end,
                    timestamp_completed: end,
                    generation: self.request.generation,
                    confidence_histogram: None,
                },
                completed: true,
            });
            return Ok(None);
        }

        let expected = self.references[0].series.dim();
        let got = self.dataset.dimension();
        if expected != got {
            return Err(SuggestError::DimensionMismatch { expected, got });
        }

        let (references, active) =
            prepare_references(&self.references, self.request.confidence_threshold)?;
        let matcher = SpringMatcher::new(references)?;
        let chunk_len = self.chunk_budget.div_ceil(active.len()).max(1);
        debug!(start, end, n_samples, chunk_len, "suggestion run started");

        Ok(Some(Box::new(Streaming {
            matcher,
            references: active,
            start,
            end,
            n_samples,
            step: (end - start) / n_samples as f64,
            chunk_len,
            next_index: 0,
            histogram: [0; HISTOGRAM_BUCKETS],
        })))
    }

    /// Feed one chunk. Returns whether chunks remain.
    fn process_chunk(&mut self, s: &mut Streaming) -> Result<bool, SuggestError> {
        let first = s.next_index;
        let count = s.chunk_len.min(s.n_samples - first);
        let last = first + count;
        let window = self.dataset.resample_window(
            s.start + first as f64 * s.step,
            s.start + last as f64 * s.step,
            count,
        )?;

        let mut fired: Vec<MatchResult> = Vec::new();
        for sample in window.samples() {
            if let Some(best) = s.matcher.feed(sample, |m| fired.push(m))? {
                let reference = &s.references[best.reference_index];
                let confidence = likelihood(reference.variance, best.distance);
                s.histogram[histogram_bucket(confidence)] += 1;
            }
        }
        let finished = last == s.n_samples;
        if finished {
            s.matcher.flush(|m| fired.push(m));
        }

        let generation = self.request.generation;
        let candidates: Vec<Label> = fired.iter().filter_map(|m| s.candidate(m, generation)).collect();
        debug!(
            first,
            last,
            n_candidates = candidates.len(),
            "chunk processed"
        );

        let progress = SuggestionProgress {
            timestamp_start: s.start,
            timestamp_end: s.end,
            timestamp_completed: s.start + last as f64 * s.step,
            generation,
            confidence_histogram: Some(s.histogram),
        };
        self.sink.on_update(SuggestionUpdate {
            candidates,
            progress,
            completed: false,
        });
        s.next_index = last;

        if finished {
            self.sink.on_update(SuggestionUpdate {
                candidates: Vec::new(),
                progress: SuggestionProgress {
                    timestamp_completed: s.end,
                    ..progress
                },
                completed: true,
            });
            info!(generation, "suggestion run completed");
        }
        Ok(!finished)
    }
}

impl Streaming {
    /// Convert a match into a candidate label, or `None` when the boundary
    /// corrections leave an empty span.
    fn candidate(&self, m: &MatchResult, generation: u64) -> Option<Label> {
        let reference = &self.references[m.reference_index];
        let start = self.start + m.start_index as f64 * self.step - reference.adjustments_begin;
        let end = self.start + (m.end_index + 1) as f64 * self.step - reference.adjustments_end;
        if !(start < end) {
            warn!(start, end, class = %reference.class_name, "corrected span is empty, dropped");
            return None;
        }
        Some(Label::suggestion(
            reference.class_name.clone(),
            start,
            end,
            likelihood(reference.variance, m.distance),
            generation,
        ))
    }
}

fn snap(sample_rate: f64, t: f64) -> f64 {
    (sample_rate * t).round() / sample_rate
}

/// Matcher references and label metadata for the enabled references.
fn prepare_references(
    enabled: &[ReferenceLabel],
    confidence_threshold: f64,
) -> Result<(Vec<SpringReference>, Vec<ActiveReference>), SuggestError> {
    let mut references = Vec::with_capacity(enabled.len());
    let mut active = Vec::with_capacity(enabled.len());
    for reference in enabled {
        let Some(variance) = reference.variance else {
            continue;
        };
        let threshold = distance_threshold(confidence_threshold, variance);
        let (min_len, max_len) = length_window(reference.series.len(), MATCH_LENGTH_TOLERANCE);
        references.push(SpringReference::with_length_bounds(
            reference.series.clone(),
            threshold,
            min_len,
            max_len,
        )?);
        active.push(ActiveReference {
            class_name: reference.class_name.clone(),
            variance,
            adjustments_begin: reference.adjustments_begin,
            adjustments_end: reference.adjustments_end,
        });
    }
    Ok((references, active))
}
