//! Subsequence matching of reference sequences against a sample stream.
//!
//! [`SpringMatcher`] runs the SPRING recurrence online: samples are fed one
//! at a time and non-overlapping local-minimum matches are reported as soon
//! as they can no longer improve. [`BestMatchMatcher`] runs the same
//! recurrence over a finite buffer and keeps only the single best match.

mod best_match;
mod column;
mod error;
mod reference;
mod spring;

pub use best_match::BestMatchMatcher;
pub use error::SpringError;
pub use reference::{MatchResult, SpringReference};
pub use spring::SpringMatcher;
