//! Domain layer containing the assistant's pure types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors)
//! - `assistant` - Turns, intents, branch outcomes, enrichment and stream frames

pub mod assistant;
pub mod foundation;
