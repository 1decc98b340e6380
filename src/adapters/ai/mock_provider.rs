//! Mock generation provider for testing.
//!
//! Provides a configurable mock implementation of the GenerationProvider
//! port, allowing tests to run without calling a real model.
//!
//! # Features
//!
//! - Responses queued per pipeline stage (`RequestMetadata::purpose`) or
//!   globally, plus sticky per-stage responses for multi-request tests
//! - Simulated latency, per request and per streamed chunk
//! - Error injection, including streams that fail part way through
//! - Call tracking for verification
//!
//! Streamed chunks always concatenate to exactly the buffered content.
//!
//! # Example
//!
//! ```ignore
//! let provider = MockGenerationProvider::new()
//!     .with_purpose_response(purpose::CLASSIFY, "device-control")
//!     .with_purpose_response(purpose::INTEGRATE, "The aerator in pool 3 is on.");
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    FinishReason, GenerationError, GenerationProvider, GenerationRequest, GenerationResponse,
    GenerationStream, StreamChunk,
};

const MOCK_MODEL: &str = "mock-model-1";
const DEFAULT_CONTENT: &str = "Mock response";

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(String),
    Error(MockError),
    /// Streams the first `fail_after` chunks of `content`, then fails.
    /// Buffered calls fail immediately.
    PartialStream {
        content: String,
        fail_after: usize,
        error: MockError,
    },
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    Timeout { timeout_ms: u64 },
}

impl From<MockError> for GenerationError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => GenerationError::rate_limited(retry_after_secs),
            MockError::Unavailable { message } => GenerationError::unavailable(message),
            MockError::AuthenticationFailed => GenerationError::AuthenticationFailed,
            MockError::Network { message } => GenerationError::network(message),
            MockError::Timeout { timeout_ms } => GenerationError::Timeout { timeout_ms },
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    queued: VecDeque<MockResponse>,
    by_purpose: HashMap<String, VecDeque<MockResponse>>,
    fixed: HashMap<String, MockResponse>,
    fail_all: Option<MockError>,
}

/// Mock generation provider.
#[derive(Debug, Clone)]
pub struct MockGenerationProvider {
    script: Arc<Mutex<Script>>,
    delay: Duration,
    chunk_delay: Duration,
    calls: Arc<Mutex<Vec<GenerationRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MockGenerationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a response for whichever call comes next.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        lock(&self.script).queued.push_back(MockResponse::Success(content.into()));
        self
    }

    /// Queues an error for whichever call comes next.
    pub fn with_error(self, error: MockError) -> Self {
        lock(&self.script).queued.push_back(MockResponse::Error(error));
        self
    }

    /// Queues a response for the next call issued by `purpose`.
    pub fn with_purpose_response(self, purpose: &str, content: impl Into<String>) -> Self {
        self.push_purpose(purpose, MockResponse::Success(content.into()))
    }

    /// Queues an error for the next call issued by `purpose`.
    pub fn with_purpose_error(self, purpose: &str, error: MockError) -> Self {
        self.push_purpose(purpose, MockResponse::Error(error))
    }

    /// Answers every call issued by `purpose` with the same response once
    /// its queue is drained.
    pub fn with_fixed_response(self, purpose: &str, response: MockResponse) -> Self {
        lock(&self.script).fixed.insert(purpose.to_string(), response);
        self
    }

    /// Fails every call regardless of configuration.
    pub fn failing(self, error: MockError) -> Self {
        lock(&self.script).fail_all = Some(error);
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets simulated latency before each streamed chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    fn push_purpose(self, purpose: &str, response: MockResponse) -> Self {
        lock(&self.script)
            .by_purpose
            .entry(purpose.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of calls issued by one pipeline stage.
    pub fn calls_for(&self, purpose: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.metadata.purpose == purpose)
            .count()
    }

    pub fn get_calls(&self) -> Vec<GenerationRequest> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Resolution order: global failure, stage queue, global queue, sticky
    /// stage response, default.
    fn next_response(&self, purpose: &str) -> MockResponse {
        let mut script = lock(&self.script);
        if let Some(err) = &script.fail_all {
            return MockResponse::Error(err.clone());
        }
        if let Some(response) = script.by_purpose.get_mut(purpose).and_then(VecDeque::pop_front) {
            return response;
        }
        if let Some(response) = script.queued.pop_front() {
            return response;
        }
        script
            .fixed
            .get(purpose)
            .cloned()
            .unwrap_or_else(|| MockResponse::Success(DEFAULT_CONTENT.to_string()))
    }

    async fn record(&self, request: GenerationRequest) -> MockResponse {
        let purpose = request.metadata.purpose;
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.next_response(purpose)
    }
}

/// Word-sized chunks that concatenate back to `content` exactly.
pub fn split_chunks(content: &str) -> Vec<String> {
    content.split_inclusive(' ').map(str::to_string).collect()
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        match self.record(request).await {
            MockResponse::Success(content) => Ok(GenerationResponse::new(content, MOCK_MODEL)),
            MockResponse::Error(err) | MockResponse::PartialStream { error: err, .. } => Err(err.into()),
        }
    }

    async fn stream_complete(&self, request: GenerationRequest) -> Result<GenerationStream, GenerationError> {
        let (content, failure) = match self.record(request).await {
            MockResponse::Success(content) => (content, None),
            MockResponse::Error(err) => return Err(err.into()),
            MockResponse::PartialStream { content, fail_after, error } => {
                let prefix: String = split_chunks(&content).into_iter().take(fail_after).collect();
                (prefix, Some(error))
            }
        };

        let chunk_delay = self.chunk_delay;
        let chunks = stream::iter(split_chunks(&content)).then(move |chunk| async move {
            if !chunk_delay.is_zero() {
                sleep(chunk_delay).await;
            }
            Ok(StreamChunk::content(chunk))
        });

        let tail = stream::once(async move {
            match failure {
                Some(err) => Err(err.into()),
                None => Ok(StreamChunk::final_chunk(FinishReason::Stop)),
            }
        });

        Ok(Box::pin(chunks.chain(tail)))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
