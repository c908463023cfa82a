//! Cooperative queue of suggestion runs keyed by caller tokens.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use labelwise_io::ResampleWindow;

use crate::config::SuggestionRequest;
use crate::model::SuggestionModel;
use crate::run::{RunState, SuggestionRun, SuggestionSink};

/// Caller-chosen identity of a result stream. At most one run is pending
/// per token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackToken(u64);

impl CallbackToken {
    /// Create a token.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Return the raw id.
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type BoxedRun<D> = SuggestionRun<D, Box<dyn SuggestionSink>>;

/// Explicit continuation queue for suggestion runs.
///
/// Nothing runs on its own: each [`step`](SuggestionScheduler::step)
/// resumes the run at the front of the queue for exactly one chunk and puts
/// it back at the end if it has more to do. The caller decides when to
/// step, so the host stays responsive between chunks.
pub struct SuggestionScheduler<D> {
    queue: VecDeque<(CallbackToken, BoxedRun<D>)>,
}

impl<D> Default for SuggestionScheduler<D> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<D: ResampleWindow> SuggestionScheduler<D> {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a computation of `request` under `token`.
    ///
    /// A run already pending under `token` is cancelled first. The new run
    /// does no work until stepped.
    #[instrument(skip_all, fields(token = %token, generation = request.generation))]
    pub fn compute_suggestion<S>(
        &mut self,
        model: &SuggestionModel,
        dataset: Arc<D>,
        request: SuggestionRequest,
        token: CallbackToken,
        sink: S,
    ) where
        S: SuggestionSink + 'static,
    {
        if self.cancel(token) {
            debug!("superseded pending run");
        }
        let run = SuggestionRun::new(model, dataset, request, Box::new(sink) as Box<dyn SuggestionSink>);
        self.queue.push_back((token, run));
    }

    /// Drop the pending run for `token`. Updates already delivered stand.
    /// Returns whether a run was pending.
    pub fn cancel(&mut self, token: CallbackToken) -> bool {
        let before = self.queue.len();
        self.queue.retain(|(t, _)| *t != token);
        let cancelled = self.queue.len() != before;
        if cancelled {
            debug!(token = %token, "run cancelled");
        }
        cancelled
    }

    /// True when a run is pending for `token`.
    #[must_use]
    pub fn is_pending(&self, token: CallbackToken) -> bool {
        self.queue.iter().any(|(t, _)| *t == token)
    }

    /// Number of pending runs.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Resume one run for one chunk, round-robin. Returns whether any run
    /// is still pending afterwards.
    pub fn step(&mut self) -> bool {
        if let Some((token, mut run)) = self.queue.pop_front()
            && run.resume() == RunState::Pending
        {
            self.queue.push_back((token, run));
        }
        !self.queue.is_empty()
    }

    /// Step until no run is pending. Returns the number of chunks processed.
    pub fn run_until_idle(&mut self) -> usize {
        let mut steps = 0;
        while !self.queue.is_empty() {
            self.step();
            steps += 1;
        }
        steps
    }

    /// Cancel every pending run.
    pub fn dispose(&mut self) {
        debug!(n_runs = self.queue.len(), "scheduler disposed");
        self.queue.clear();
    }
}
