//! Core processing for Triage.
//!
//! This crate ties together extraction, token budgeting, the model gateway,
//! and response normalization into one processing run per artifact
//! ([`Pipeline::process`]), plus reprocessing of stored records and routing of
//! externally delivered URLs.

pub mod budget;
pub mod delivery;
pub mod normalize;
pub mod pipeline;

pub use budget::{BudgetedText, budget, estimate_tokens};
pub use normalize::{NormalizedVerdict, normalize};
pub use pipeline::{ConfigSource, Pipeline, ProgressReporter, SilentProgress, Stage};
