//! Synthesizes additional unified-diff patch variants by rewriting an `if`
//! condition found on a changed line, then repairing the hunk headers so the
//! variant still parses as a legal patch.
//!
//! Pipeline per patch: [`hunk::HunkIndex::locate`] → [`site::find_candidates`]
//! → [`site::verify`] → [`synth::synthesize`] → [`renumber::renumber`] →
//! [`sink::VariantSink::persist`]. [`controller::Controller`] drives it over a
//! directory tree.

pub mod config;
pub mod controller;
pub mod error;
pub mod hunk;
pub mod patch;
pub mod renumber;
pub mod sink;
pub mod site;
pub mod strategy;
pub mod synth;

pub use config::{Config, SamplingPolicy};
pub use controller::{BatchSummary, Controller, PatchReport};
pub use error::{Result, SynthError};
pub use hunk::{HunkHeader, HunkIndex};
pub use patch::Patch;
pub use sink::{MirrorSink, VariantSink};
pub use site::{ConditionSpan, ConditionalSite};
pub use strategy::STRATEGY_COUNT;
pub use synth::{Rewrite, Variant};
