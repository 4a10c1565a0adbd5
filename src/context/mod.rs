//! Cross-Step Context
//!
//! Lets later steps adapt to what earlier steps discovered.
//!
//! - [`rules`]: Per-stage extraction rule table
//! - [`accumulator`]: Run context and parameter building

pub mod accumulator;
pub mod rules;

pub use accumulator::{keys, ContextAccumulator, WorkflowContext};
pub use rules::{ExtractionRule, Extraction, RULES};
