//! Application handlers.

pub mod assistant;

pub use assistant::{ChatRequest, OrchestratorConfig, OrchestratorDeps, ProcessResult, RequestOrchestrator};
