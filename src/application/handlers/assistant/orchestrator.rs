//! RequestOrchestrator - runs one chat request end to end.
//!
//! Load history, save the user turn, start the background search, classify,
//! maybe enrich with weather, run one branch (resolving failures through the
//! fallback table), join the search, integrate, save the assistant turn.
//!
//! Every request that gets its user turn persisted also gets exactly one
//! assistant turn, whatever happens in between.

use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::domain::assistant::{
    BranchKind, BranchOutcome, BranchResult, BranchSource, ConversationTurn, EnrichmentBundle,
    IntentLabel, NewTurn, ResponseMetadata, ResponseStatus, SearchStatus, SessionContext,
};
use crate::domain::foundation::{DomainError, SessionId, TurnId, ValidationError};
use crate::ports::{
    ChunkSink, DeviceController, ExpertConsultant, GenerationProvider, HistoryLog, SearchProvider,
    SinkError, WeatherProvider,
};

use super::background_search::BackgroundSearch;
use super::branches::{
    BranchHandler, BranchInput, CasualChatBranch, DeviceControlBranch, ExpertConsultationBranch,
    REWRITTEN_QUERY_KEY,
};
use super::integration::{IntegrationInput, IntegrationStage};
use super::intent_classifier::IntentClassifier;
use super::prompts::{device_error_message, GENERIC_FAILURE_MESSAGE};
use super::query_rewriter::QueryRewriter;
use super::settings::OrchestratorConfig;
use super::support::elapsed_ms;
use super::weather_enricher::WeatherEnricher;

/// Longest accepted message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

/// Placed between partially delivered text and the failure notice.
const FAILURE_SEPARATOR: &str = "\n\n";

/// A validated chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub session_id: SessionId,
    pub message: String,
    /// Opaque caller context (pond id, species, ...).
    pub context: BTreeMap<String, String>,
}

impl ChatRequest {
    pub fn new(session_id: &str, message: &str) -> Result<Self, ValidationError> {
        let session_id = SessionId::new(session_id)?;
        if message.trim().is_empty() {
            return Err(ValidationError::empty_field("message"));
        }
        let length = message.chars().count();
        if length > MAX_MESSAGE_CHARS {
            return Err(ValidationError::out_of_range(
                "message",
                1,
                MAX_MESSAGE_CHARS as i64,
                length as i64,
            ));
        }

        Ok(Self {
            session_id,
            message: message.to_string(),
            context: BTreeMap::new(),
        })
    }

    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context = context;
        self
    }
}

/// What the caller gets back, in both delivery modes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessResult {
    pub status: ResponseStatus,
    pub response: String,
    pub intent: Option<IntentLabel>,
    pub session_id: SessionId,
    pub metadata: ResponseMetadata,
}

impl ProcessResult {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Failures that reach the orchestrator boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    #[error("casual chat failed: {0}")]
    ChatFailed(String),

    #[error("{stage} stage panicked: {message}")]
    Panicked { stage: &'static str, message: String },
}

/// External collaborators. Only generation and history are mandatory;
/// an absent capability disables whatever depends on it.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub generation: Arc<dyn GenerationProvider>,
    pub history: Arc<dyn HistoryLog>,
    pub expert: Option<Arc<dyn ExpertConsultant>>,
    pub device: Option<Arc<dyn DeviceController>>,
    pub weather: Option<Arc<dyn WeatherProvider>>,
    pub search: Option<Arc<dyn SearchProvider>>,
}

impl OrchestratorDeps {
    pub fn new(generation: Arc<dyn GenerationProvider>, history: Arc<dyn HistoryLog>) -> Self {
        Self {
            generation,
            history,
            expert: None,
            device: None,
            weather: None,
            search: None,
        }
    }

    pub fn with_expert(mut self, expert: Arc<dyn ExpertConsultant>) -> Self {
        self.expert = Some(expert);
        self
    }

    pub fn with_device(mut self, device: Arc<dyn DeviceController>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }
}

pub struct RequestOrchestrator {
    history: Arc<dyn HistoryLog>,
    search: Option<Arc<dyn SearchProvider>>,
    classifier: IntentClassifier,
    weather: WeatherEnricher,
    device: DeviceControlBranch,
    expert: ExpertConsultationBranch,
    chat: CasualChatBranch,
    integration: IntegrationStage,
    config: OrchestratorConfig,
}

impl RequestOrchestrator {
    pub fn new(deps: OrchestratorDeps, config: OrchestratorConfig) -> Self {
        let generation = deps.generation;
        let settings = &config.generation;

        let rewriter = QueryRewriter::new(
            generation.clone(),
            settings,
            config.rewrite_window,
            config.generation_timeout,
        );

        Self {
            history: deps.history,
            search: deps.search,
            classifier: IntentClassifier::new(generation.clone(), settings, config.generation_timeout),
            weather: WeatherEnricher::new(
                generation.clone(),
                deps.weather,
                settings,
                config.enable_weather,
                config.default_location.clone(),
                config.generation_timeout,
                config.weather_timeout,
            ),
            device: DeviceControlBranch::new(deps.device, config.enable_device_control, config.device_timeout),
            expert: ExpertConsultationBranch::new(
                deps.expert,
                rewriter,
                settings.clone(),
                config.enable_expert_consultation,
                config.expert_timeout,
            ),
            chat: CasualChatBranch::new(generation.clone(), settings.clone(), config.generation_timeout),
            integration: IntegrationStage::new(generation, settings.clone(), config.generation_timeout),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Ordered turns of a session, for the history endpoint.
    pub async fn history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, DomainError> {
        self.history.query(session_id, limit).await
    }

    /// Runs one request. Buffered when `sink` is `None`; otherwise the final
    /// answer is pushed to `sink` chunk by chunk as it is produced.
    #[instrument(skip_all, fields(session_id = %request.session_id))]
    pub async fn process(&self, request: ChatRequest, sink: Option<&dyn ChunkSink>) -> ProcessResult {
        let started = Instant::now();
        let ChatRequest {
            session_id,
            message,
            context,
        } = request;
        let mut metadata = ResponseMetadata::default();

        let history = match self.history.query(&session_id, self.config.history_limit).await {
            Ok(turns) => turns,
            Err(err) => {
                tracing::warn!(error = %err, "History unavailable, continuing without it");
                Vec::new()
            }
        };
        let session = SessionContext::new(session_id.clone(), history, self.config.history_limit)
            .with_auxiliary(context);

        if let Err(err) = self.append(NewTurn::user(session_id.clone(), &message)).await {
            tracing::error!(error = %err, "Could not persist user turn, request abandoned");
            metadata.error = Some(err.to_string());
            metadata.timings.total_ms = elapsed_ms(started);
            return ProcessResult {
                status: ResponseStatus::Error,
                response: GENERIC_FAILURE_MESSAGE.to_string(),
                intent: None,
                session_id,
                metadata,
            };
        }

        let search = match &self.search {
            Some(provider) if self.config.enable_background_search => {
                BackgroundSearch::start(provider.clone(), message.clone(), self.config.search_timeout)
            }
            _ => BackgroundSearch::disabled(),
        };

        let recorder = sink.map(RecordingSink::new);
        let delivery = recorder.as_ref().map(|r| r as &dyn ChunkSink);

        let (mut status, response) = match self
            .run_pipeline(&message, &session, search, delivery, &mut metadata)
            .await
        {
            Ok(answer) => (ResponseStatus::Success, answer),
            Err(err) => {
                tracing::error!(error = %err, "Pipeline failed, persisting generic failure");
                metadata.error = Some(err.to_string());
                let response = match &recorder {
                    Some(recorder) => recorder.finish_with_failure(&mut metadata).await,
                    None => GENERIC_FAILURE_MESSAGE.to_string(),
                };
                (ResponseStatus::Error, response)
            }
        };
        metadata.timings.total_ms = elapsed_ms(started);

        let mut turn = NewTurn::assistant(session_id.clone(), &response).with_metadata(metadata.to_turn_metadata());
        if let Some(intent) = metadata.intent {
            turn = turn.with_intent(intent);
        }
        if let Err(err) = self.append(turn).await {
            tracing::error!(error = %err, "Could not persist assistant turn");
            status = ResponseStatus::Error;
            metadata.error.get_or_insert_with(|| err.to_string());
        }

        tracing::info!(
            status = status.as_str(),
            intent = ?metadata.intent,
            source = ?metadata.source,
            total_ms = metadata.timings.total_ms,
            "Request finished"
        );

        ProcessResult {
            status,
            response,
            intent: metadata.intent,
            session_id,
            metadata,
        }
    }

    async fn run_pipeline(
        &self,
        message: &str,
        session: &SessionContext,
        search: BackgroundSearch,
        sink: Option<&dyn ChunkSink>,
        metadata: &mut ResponseMetadata,
    ) -> Result<String, OrchestratorError> {
        let (intent, stats) = self.classifier.classify(message, session.recent_history()).await;
        metadata.intent = Some(intent);
        metadata.timings.classify_ms = stats.elapsed_ms;

        let weather_started = Instant::now();
        let weather = self.weather.maybe_enrich(message).await;
        metadata.weather_included = weather.is_some();
        metadata.timings.weather_ms = elapsed_ms(weather_started);

        let kind = intent.branch();
        metadata.branch = Some(kind);
        metadata.device_agent_used = kind == BranchKind::DeviceControl;

        let branch_started = Instant::now();
        let input = BranchInput::new(message, session);
        let result = guarded("branch", self.run_branch(kind, input, metadata)).await??;
        metadata.timings.branch_ms = elapsed_ms(branch_started);
        metadata.source = Some(result.source);
        metadata.branch_success = result.success;
        metadata.expert_consulted = result.source == BranchSource::Expert;
        metadata.chat_agent_used = result.source == BranchSource::Chat;
        metadata.branch_extra = result.extra.clone();

        let wait_started = Instant::now();
        let search = search.join(self.config.wait_budget).await;
        metadata.search = SearchStatus::from(&search);
        metadata.timings.search_wait_ms = elapsed_ms(wait_started);

        let enrichment = EnrichmentBundle::new(weather, search);
        let input = IntegrationInput {
            user_query: message,
            branch: &result,
            context: session,
            enrichment: &enrichment,
        };
        let outcome = guarded("integrate", self.integration.integrate(input, sink)).await?;
        metadata.streamed = outcome.streamed;
        metadata.interrupted = outcome.interrupted;
        metadata.truncated = outcome.truncated;
        metadata.integration_failed = outcome.failed;
        metadata.undelivered_draft = outcome.undelivered_draft;
        metadata.timings.integrate_ms = outcome.elapsed_ms;
        if let Some(error) = outcome.error {
            metadata.error = Some(error);
        }

        Ok(outcome.answer)
    }

    /// Runs the selected branch and applies the fallback table.
    async fn run_branch(
        &self,
        kind: BranchKind,
        input: BranchInput<'_>,
        metadata: &mut ResponseMetadata,
    ) -> Result<BranchResult, OrchestratorError> {
        let failure = match self.handler_for(kind).handle(input).await {
            BranchOutcome::Ok(result) => {
                if let Some(rewritten) = result.extra.get(REWRITTEN_QUERY_KEY).and_then(|v| v.as_str()) {
                    metadata.query_rewritten = rewritten != input.text;
                }
                return Ok(result);
            }
            BranchOutcome::Degraded(result) => return Ok(result),
            BranchOutcome::Fail(failure) => failure,
        };

        match kind {
            BranchKind::DeviceControl => {
                tracing::warn!(reason = %failure.reason, detail = %failure.detail, "Device command failed");
                Ok(BranchResult::new(device_error_message(&failure.detail), BranchSource::Device, false))
            }
            BranchKind::ExpertConsultation => {
                let query = failure.fallback_query.as_deref().unwrap_or(input.text);
                tracing::warn!(
                    reason = %failure.reason,
                    detail = %failure.detail,
                    "Expert consultation failed, falling back to casual chat"
                );
                metadata.fallback_from = Some(kind);
                metadata.fallback_reason = Some(failure.reason);
                metadata.query_rewritten = query != input.text;

                match self.chat.handle(input.with_text(query)).await {
                    BranchOutcome::Ok(result) | BranchOutcome::Degraded(result) => Ok(result),
                    BranchOutcome::Fail(chat) => Err(OrchestratorError::ChatFailed(chat.detail)),
                }
            }
            BranchKind::CasualChat => Err(OrchestratorError::ChatFailed(failure.detail)),
        }
    }

    fn handler_for(&self, kind: BranchKind) -> &dyn BranchHandler {
        match kind {
            BranchKind::DeviceControl => &self.device,
            BranchKind::ExpertConsultation => &self.expert,
            BranchKind::CasualChat => &self.chat,
        }
    }

    /// Appends one turn, retrying once.
    async fn append(&self, turn: NewTurn) -> Result<TurnId, DomainError> {
        match self.history.append(turn.clone()).await {
            Ok(id) => Ok(id),
            Err(err) => {
                tracing::warn!(error = %err, role = turn.role.as_str(), "History append failed, retrying");
                self.history.append(turn).await
            }
        }
    }
}

/// Runs a stage, turning a panic into an `OrchestratorError`.
async fn guarded<F: Future>(stage: &'static str, future: F) -> Result<F::Output, OrchestratorError> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| OrchestratorError::Panicked {
            stage,
            message: panic_message(panic.as_ref()),
        })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Wraps the caller's sink and remembers what it accepted, so a failure
/// after partial delivery can still persist exactly what was shown.
struct RecordingSink<'a> {
    inner: &'a dyn ChunkSink,
    delivered: Mutex<String>,
}

impl<'a> RecordingSink<'a> {
    fn new(inner: &'a dyn ChunkSink) -> Self {
        Self {
            inner,
            delivered: Mutex::new(String::new()),
        }
    }

    fn delivered(&self) -> String {
        lock(&self.delivered).clone()
    }

    /// Appends the generic failure notice to whatever was already shown and
    /// returns the full delivered text. A notice the sink refused is kept
    /// in metadata only.
    async fn finish_with_failure(&self, metadata: &mut ResponseMetadata) -> String {
        let notice = if lock(&self.delivered).is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            format!("{}{}", FAILURE_SEPARATOR, GENERIC_FAILURE_MESSAGE)
        };

        if self.send_chunk(&notice).await.is_err() {
            metadata.interrupted = true;
            metadata.undelivered_draft = Some(GENERIC_FAILURE_MESSAGE.to_string());
        }
        self.delivered()
    }
}

#[async_trait]
impl<'a> ChunkSink for RecordingSink<'a> {
    async fn send_chunk(&self, chunk: &str) -> Result<(), SinkError> {
        self.inner.send_chunk(chunk).await?;
        lock(&self.delivered).push_str(chunk);
        Ok(())
    }
}
