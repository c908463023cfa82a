//! Reference building, streaming label suggestion and deployment code
//! generation.
//!
//! [`ReferenceBuilder`] turns confirmed labels into a [`SuggestionModel`]:
//! one DBA prototype per class with a DTW variance and calibrated boundary
//! corrections. A [`SuggestionRun`] streams a time range through the
//! model's references in bounded chunks and reports candidate labels to a
//! [`SuggestionSink`]; [`SuggestionScheduler`] interleaves runs keyed by
//! [`CallbackToken`].

mod builder;
mod config;
mod deploy;
mod error;
mod likelihood;
mod model;
mod run;
mod scheduler;

pub use builder::{BuiltReferences, ReferenceBuilder};
pub use config::{BuilderConfig, SuggestionRequest};
pub use deploy::Platform;
pub use error::SuggestError;
pub use likelihood::{HISTOGRAM_BUCKETS, distance_threshold, histogram_bucket, likelihood};
pub use model::{DEFAULT_CHUNK_BUDGET, ReferenceLabel, SuggestionModel};
pub use run::{RunState, SuggestionEvent, SuggestionRun, SuggestionSink, SuggestionUpdate};
pub use scheduler::{CallbackToken, SuggestionScheduler};
