//! IntegrationStage - composes the final answer from a branch draft.
//!
//! Buffered and streamed modes send the same request to the generation
//! capability, so a deterministic provider yields the same text in both.
//! The stage never fails: the worst case is an apology. When streaming, the
//! persisted answer is only ever what the sink accepted.

use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{timeout_at, Instant as Deadline};

use crate::domain::assistant::{BranchResult, EnrichmentBundle, SessionContext};
use crate::ports::{
    purpose, ChunkSink, GenerationError, GenerationProvider, GenerationRequest, GenerationSettings,
    MessageRole, RequestMetadata,
};

use super::prompts::{integration_apology, IntegrationPrompt, INTEGRATION_SYSTEM};
use super::support::{complete_within, elapsed_ms, history_messages};

/// Recent turns included ahead of the composition prompt.
const INTEGRATION_HISTORY_TURNS: usize = 4;

/// Everything the composition prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationInput<'a> {
    pub user_query: &'a str,
    pub branch: &'a BranchResult,
    pub context: &'a SessionContext,
    pub enrichment: &'a EnrichmentBundle,
}

/// Final answer plus what happened while producing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrationOutcome {
    /// Text to persist. When streaming, exactly the concatenation of the
    /// chunks the sink accepted, possibly empty.
    pub answer: String,
    /// Text that was ready but never reached the client.
    pub undelivered_draft: Option<String>,
    pub streamed: bool,
    pub chunks_sent: usize,
    /// The sink closed before the answer was complete.
    pub interrupted: bool,
    /// Generation failed after some chunks were delivered.
    pub truncated: bool,
    /// Composition produced nothing usable; `answer` is a fallback.
    pub failed: bool,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

pub struct IntegrationStage {
    provider: Arc<dyn GenerationProvider>,
    settings: GenerationSettings,
    timeout: Duration,
}

impl IntegrationStage {
    pub fn new(provider: Arc<dyn GenerationProvider>, settings: GenerationSettings, timeout: Duration) -> Self {
        Self {
            provider,
            settings,
            timeout,
        }
    }

    /// Buffered when `sink` is `None`, streamed otherwise.
    pub async fn integrate(&self, input: IntegrationInput<'_>, sink: Option<&dyn ChunkSink>) -> IntegrationOutcome {
        let started = Instant::now();
        let request = self.request(&input);

        let mut outcome = match sink {
            None => self.buffered(request, &input).await,
            Some(sink) => self.streamed(request, &input, sink).await,
        };
        outcome.elapsed_ms = elapsed_ms(started);

        tracing::info!(
            session_id = %input.context.session_id(),
            source = %input.branch.source,
            streamed = outcome.streamed,
            chunks = outcome.chunks_sent,
            failed = outcome.failed,
            elapsed_ms = outcome.elapsed_ms,
            "Integration finished"
        );
        outcome
    }

    fn request(&self, input: &IntegrationInput<'_>) -> GenerationRequest {
        let weather = input.enrichment.weather_text();
        let search = input.enrichment.search_text();
        let auxiliary = input.context.auxiliary_lines();

        let prompt = IntegrationPrompt {
            user_query: input.user_query,
            raw_answer: &input.branch.raw_answer,
            source: input.branch.source,
            weather: weather.as_deref(),
            search: search.as_deref(),
            auxiliary: auxiliary.as_deref(),
        };

        GenerationRequest::new(
            self.settings.clone(),
            RequestMetadata::new(purpose::INTEGRATE).with_session(input.context.session_id().clone()),
        )
        .with_system_prompt(INTEGRATION_SYSTEM)
        .with_messages(history_messages(input.context.last_turns(INTEGRATION_HISTORY_TURNS)))
        .with_message(MessageRole::User, prompt.render())
    }

    async fn buffered(&self, request: GenerationRequest, input: &IntegrationInput<'_>) -> IntegrationOutcome {
        match complete_within(self.provider.as_ref(), request, self.timeout).await {
            Ok(answer) if !answer.trim().is_empty() => IntegrationOutcome {
                answer,
                ..Default::default()
            },
            Ok(_) => {
                tracing::warn!("Integration returned empty text, using the branch draft");
                IntegrationOutcome {
                    answer: input.branch.raw_answer.clone(),
                    failed: true,
                    ..Default::default()
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Integration generation failed");
                IntegrationOutcome {
                    answer: integration_apology(&err.to_string()),
                    failed: true,
                    error: Some(err.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    async fn streamed(
        &self,
        request: GenerationRequest,
        input: &IntegrationInput<'_>,
        sink: &dyn ChunkSink,
    ) -> IntegrationOutcome {
        let mut outcome = IntegrationOutcome {
            streamed: true,
            ..Default::default()
        };
        let deadline = Deadline::now() + self.timeout;
        let timed_out = GenerationError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        };

        let failure = match timeout_at(deadline, self.provider.stream_complete(request)).await {
            Ok(Ok(mut stream)) => loop {
                let item = match timeout_at(deadline, stream.next()).await {
                    Ok(item) => item,
                    Err(_) => break Some(timed_out),
                };
                match item {
                    None => break None,
                    Some(Ok(chunk)) => {
                        if !chunk.delta.is_empty() {
                            if sink.send_chunk(&chunk.delta).await.is_err() {
                                outcome.interrupted = true;
                                break None;
                            }
                            outcome.answer.push_str(&chunk.delta);
                            outcome.chunks_sent += 1;
                        }
                        if chunk.is_final() {
                            break None;
                        }
                    }
                    Some(Err(err)) => break Some(err),
                }
            },
            Ok(Err(err)) => Some(err),
            Err(_) => Some(timed_out),
        };

        if outcome.interrupted {
            tracing::info!(chunks = outcome.chunks_sent, "Chunk sink closed, generation abandoned");
            if outcome.chunks_sent == 0 {
                outcome.undelivered_draft = Some(input.branch.raw_answer.clone());
            }
            return outcome;
        }

        match failure {
            Some(err) if outcome.chunks_sent > 0 => {
                tracing::warn!(error = %err, chunks = outcome.chunks_sent, "Integration stream failed midway");
                outcome.truncated = true;
                outcome.error = Some(err.to_string());
            }
            Some(err) => {
                tracing::error!(error = %err, "Integration stream failed");
                outcome.failed = true;
                outcome.error = Some(err.to_string());
                self.deliver_fallback(&mut outcome, integration_apology(&err.to_string()), sink)
                    .await;
            }
            None if outcome.chunks_sent == 0 => {
                tracing::warn!("Integration stream was empty, using the branch draft");
                outcome.failed = true;
                self.deliver_fallback(&mut outcome, input.branch.raw_answer.clone(), sink)
                    .await;
            }
            None => {}
        }
        outcome
    }

    /// Sends a replacement answer as a single chunk. It only becomes the
    /// answer if the sink accepted it.
    async fn deliver_fallback(&self, outcome: &mut IntegrationOutcome, text: String, sink: &dyn ChunkSink) {
        if sink.send_chunk(&text).await.is_ok() {
            outcome.chunks_sent += 1;
            outcome.answer = text;
        } else {
            tracing::info!("Chunk sink closed before the fallback answer was sent");
            outcome.interrupted = true;
            outcome.undelivered_draft = Some(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockError, MockGenerationProvider, MockResponse};
    use crate::domain::assistant::{BranchSource, SearchHit, SearchOutcome, WeatherSnapshot};
    use crate::domain::foundation::SessionId;
    use crate::ports::SinkError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const COMPOSED: &str = "Pond 3 aerator is now running. Check dissolved oxygen again at dusk.";

    /// Records chunks and optionally closes after `capacity` of them.
    #[derive(Default)]
    struct Collect {
        chunks: Mutex<Vec<String>>,
        capacity: Option<usize>,
    }

    impl Collect {
        fn closing_after(capacity: usize) -> Self {
            Self {
                capacity: Some(capacity),
                ..Default::default()
            }
        }

        fn text(&self) -> String {
            self.chunks.lock().unwrap().concat()
        }

        fn count(&self) -> usize {
            self.chunks.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChunkSink for Collect {
        async fn send_chunk(&self, chunk: &str) -> Result<(), SinkError> {
            let mut chunks = self.chunks.lock().unwrap();
            if self.capacity.is_some_and(|cap| chunks.len() >= cap) {
                return Err(SinkError::Closed);
            }
            chunks.push(chunk.to_string());
            Ok(())
        }
    }

    fn stage(provider: &MockGenerationProvider) -> IntegrationStage {
        IntegrationStage::new(Arc::new(provider.clone()), GenerationSettings::default(), Duration::from_secs(1))
    }

    fn context() -> SessionContext {
        SessionContext::new(SessionId::new("farm-1").unwrap(), vec![], 20)
    }

    fn draft() -> BranchResult {
        BranchResult::new("Aerator activated", BranchSource::Device, true)
    }

    async fn run(
        provider: &MockGenerationProvider,
        enrichment: &EnrichmentBundle,
        sink: Option<&dyn ChunkSink>,
    ) -> IntegrationOutcome {
        let ctx = context();
        let branch = draft();
        let input = IntegrationInput {
            user_query: "Turn on the aerator in pool 3",
            branch: &branch,
            context: &ctx,
            enrichment,
        };
        stage(provider).integrate(input, sink).await
    }

    mod buffered {
        use super::*;

        #[tokio::test]
        async fn returns_composed_answer() {
            let provider = MockGenerationProvider::new().with_purpose_response(purpose::INTEGRATE, COMPOSED);

            let outcome = run(&provider, &EnrichmentBundle::empty(), None).await;

            assert_eq!(outcome.answer, COMPOSED);
            assert!(!outcome.streamed);
            assert!(!outcome.failed);
        }

        #[tokio::test]
        async fn prompt_embeds_draft_and_enrichment() {
            let provider = MockGenerationProvider::new();
            let enrichment = EnrichmentBundle::new(
                Some(WeatherSnapshot {
                    city: "Ningbo".into(),
                    temp: 31.0,
                    feels_like: 35.0,
                    humidity: 70.0,
                    weather: "sunny".into(),
                    wind_speed: 1.0,
                }),
                SearchOutcome::Found(vec![SearchHit {
                    title: "Aeration at night".into(),
                    snippet: "Run aerators before dawn".into(),
                    url: None,
                }]),
            );

            run(&provider, &enrichment, None).await;

            let prompt = provider.get_calls()[0].last_user_message().unwrap().to_string();
            assert!(prompt.contains("Aerator activated"));
            assert!(prompt.contains("Ningbo"));
            assert!(prompt.contains("Aeration at night"));
        }

        #[tokio::test]
        async fn failure_becomes_apology() {
            let provider = MockGenerationProvider::new().failing(MockError::Network { message: "reset".into() });

            let outcome = run(&provider, &EnrichmentBundle::empty(), None).await;

            assert!(outcome.failed);
            assert!(outcome.answer.starts_with("Sorry"));
            assert!(outcome.answer.contains("reset"));
        }

        #[tokio::test]
        async fn empty_composition_falls_back_to_draft() {
            let provider = MockGenerationProvider::new().with_purpose_response(purpose::INTEGRATE, "");

            let outcome = run(&provider, &EnrichmentBundle::empty(), None).await;

            assert!(outcome.failed);
            assert_eq!(outcome.answer, "Aerator activated");
        }
    }

    mod streamed {
        use super::*;

        #[tokio::test]
        async fn matches_buffered_text() {
            let provider = MockGenerationProvider::new()
                .with_fixed_response(purpose::INTEGRATE, MockResponse::Success(COMPOSED.into()));
            let sink = Collect::default();

            let buffered = run(&provider, &EnrichmentBundle::empty(), None).await;
            let streamed = run(&provider, &EnrichmentBundle::empty(), Some(&sink)).await;

            assert_eq!(streamed.answer, buffered.answer);
            assert_eq!(sink.text(), streamed.answer);
            assert!(streamed.streamed);
            assert!(streamed.chunks_sent > 1);
        }

        #[tokio::test]
        async fn closed_sink_keeps_only_delivered_text() {
            let provider = MockGenerationProvider::new().with_purpose_response(purpose::INTEGRATE, COMPOSED);
            let sink = Collect::closing_after(3);

            let outcome = run(&provider, &EnrichmentBundle::empty(), Some(&sink)).await;

            assert!(outcome.interrupted);
            assert_eq!(outcome.chunks_sent, 3);
            assert_eq!(outcome.answer, sink.text());
            assert!(COMPOSED.starts_with(&outcome.answer));
        }

        #[tokio::test]
        async fn sink_closed_before_first_chunk_persists_nothing() {
            let provider = MockGenerationProvider::new().with_purpose_response(purpose::INTEGRATE, COMPOSED);
            let sink = Collect::closing_after(0);

            let outcome = run(&provider, &EnrichmentBundle::empty(), Some(&sink)).await;

            assert!(outcome.interrupted);
            assert_eq!(outcome.chunks_sent, 0);
            assert_eq!(outcome.answer, "");
            assert_eq!(outcome.undelivered_draft.as_deref(), Some("Aerator activated"));
        }

        #[tokio::test]
        async fn apology_for_closed_sink_is_not_persisted() {
            let provider = MockGenerationProvider::new().failing(MockError::Unavailable { message: "down".into() });
            let sink = Collect::closing_after(0);

            let outcome = run(&provider, &EnrichmentBundle::empty(), Some(&sink)).await;

            assert!(outcome.failed);
            assert!(outcome.interrupted);
            assert_eq!(outcome.answer, "");
            assert!(outcome.undelivered_draft.unwrap().starts_with("Sorry"));
        }

        #[tokio::test]
        async fn midway_failure_keeps_prefix() {
            let provider = MockGenerationProvider::new().with_fixed_response(
                purpose::INTEGRATE,
                MockResponse::PartialStream {
                    content: COMPOSED.into(),
                    fail_after: 2,
                    error: MockError::Network { message: "reset".into() },
                },
            );
            let sink = Collect::default();

            let outcome = run(&provider, &EnrichmentBundle::empty(), Some(&sink)).await;

            assert!(outcome.truncated);
            assert!(!outcome.failed);
            assert_eq!(outcome.chunks_sent, 2);
            assert_eq!(outcome.answer, sink.text());
        }

        #[tokio::test]
        async fn upfront_failure_streams_apology() {
            let provider = MockGenerationProvider::new().failing(MockError::Unavailable { message: "down".into() });
            let sink = Collect::default();

            let outcome = run(&provider, &EnrichmentBundle::empty(), Some(&sink)).await;

            assert!(outcome.failed);
            assert_eq!(sink.count(), 1);
            assert_eq!(sink.text(), outcome.answer);
            assert!(outcome.answer.starts_with("Sorry"));
        }

        #[tokio::test]
        async fn stalled_stream_hits_deadline() {
            let provider = MockGenerationProvider::new()
                .with_purpose_response(purpose::INTEGRATE, COMPOSED)
                .with_chunk_delay(Duration::from_millis(400));
            let sink = Collect::default();
            let ctx = context();
            let branch = draft();
            let enrichment = EnrichmentBundle::empty();
            let input = IntegrationInput {
                user_query: "Turn on the aerator in pool 3",
                branch: &branch,
                context: &ctx,
                enrichment: &enrichment,
            };
            let stage = IntegrationStage::new(
                Arc::new(provider.clone()),
                GenerationSettings::default(),
                Duration::from_millis(1000),
            );

            let outcome = stage.integrate(input, Some(&sink)).await;

            assert!(outcome.truncated);
            assert_eq!(outcome.chunks_sent, 2);
            assert_eq!(outcome.answer, sink.text());
        }
    }
}
