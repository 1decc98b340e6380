//! Application layer - the request pipeline.
//!
//! Coordinates domain types and ports; owns no I/O of its own.

pub mod handlers;

pub use handlers::{ChatRequest, OrchestratorConfig, OrchestratorDeps, ProcessResult, RequestOrchestrator};
