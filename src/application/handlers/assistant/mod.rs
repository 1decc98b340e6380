//! Assistant request pipeline.
//!
//! Leaves (`IntentClassifier`, `QueryRewriter`, `WeatherEnricher`,
//! `BackgroundSearch`) contain their own failures. The branch handlers
//! build on them, and `IntegrationStage` plus `RequestOrchestrator` sit on
//! top.

mod background_search;
pub mod branches;
mod integration;
mod intent_classifier;
mod orchestrator;
pub mod prompts;
mod query_rewriter;
mod settings;
mod support;
mod weather_enricher;

pub use background_search::BackgroundSearch;
pub use branches::{BranchHandler, BranchInput, CasualChatBranch, DeviceControlBranch, ExpertConsultationBranch};
pub use integration::{IntegrationInput, IntegrationOutcome, IntegrationStage};
pub use intent_classifier::{ClassificationStats, IntentClassifier};
pub use orchestrator::{
    ChatRequest, OrchestratorDeps, OrchestratorError, ProcessResult, RequestOrchestrator, MAX_MESSAGE_CHARS,
};
pub use query_rewriter::{QueryRewriter, RewriteStats};
pub use settings::OrchestratorConfig;
pub use weather_enricher::{extract_location, WeatherEnricher};
