//! Generation Port - Interface for the text-generation capability.
//!
//! Every language-model call the pipeline makes (classification, query
//! rewriting, weather relevance, casual chat, final integration) goes
//! through this port, so a single deterministic test double can drive the
//! whole orchestrator.
//!
//! # Design
//!
//! - Buffered (`complete`) and streamed (`stream_complete`) modes
//! - A stream is a finite, non-restartable sequence of chunks; dropping it
//!   aborts the underlying generation
//! - Provider-agnostic message format

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::domain::foundation::SessionId;

/// Boxed stream of generated chunks.
pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, GenerationError>> + Send>>;

/// Port for text generation.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate the full answer in one call.
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError>;

    /// Generate the answer as an ordered chunk stream.
    ///
    /// Concatenating every chunk `delta` yields the same text `complete`
    /// would have returned for the same request.
    async fn stream_complete(&self, request: GenerationRequest) -> Result<GenerationStream, GenerationError>;

    /// Provider name for logs.
    fn provider_name(&self) -> &str;
}

/// Knobs forwarded to the generation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    /// Sampling temperature, roughly `0.0..=2.0`.
    pub temperature: f32,
    pub max_tokens: u32,
    /// Capability-internal retrieval. Unrelated to the background search.
    pub enable_search: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "qwen-plus".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            enable_search: false,
        }
    }
}

/// Request for text generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Conversation messages (history + current prompt).
    pub messages: Vec<Message>,
    /// System prompt to guide model behavior.
    pub system_prompt: Option<String>,
    pub settings: GenerationSettings,
    /// Tracing context.
    pub metadata: RequestMetadata,
}

impl GenerationRequest {
    pub fn new(settings: GenerationSettings, metadata: RequestMetadata) -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: None,
            settings,
            metadata,
        }
    }

    /// Adds a message to the conversation.
    pub fn with_message(mut self, role: MessageRole, content: impl Into<String>) -> Self {
        self.messages.push(Message::new(role, content));
        self
    }

    /// Appends several messages at once.
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.settings.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.settings.temperature = temperature;
        self
    }

    /// Text of the last user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Stage names carried in [`RequestMetadata::purpose`].
pub mod purpose {
    pub const CLASSIFY: &str = "classify";
    pub const REWRITE: &str = "rewrite";
    pub const WEATHER_RELEVANCE: &str = "weather_relevance";
    pub const CHAT: &str = "chat";
    pub const INTEGRATE: &str = "integrate";
}

/// Which pipeline stage issued a generation call, plus its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    pub purpose: &'static str,
    pub session_id: Option<SessionId>,
}

impl RequestMetadata {
    pub fn new(purpose: &'static str) -> Self {
        Self {
            purpose,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// Buffered generation result.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub content: String,
    pub model: String,
    pub finish_reason: FinishReason,
}

impl GenerationResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            finish_reason: FinishReason::Stop,
        }
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// Streaming chunk from a generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    /// New content in this chunk.
    pub delta: String,
    /// If present, generation is complete.
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            finish_reason: None,
        }
    }

    pub fn final_chunk(finish_reason: FinishReason) -> Self {
        Self {
            delta: String::new(),
            finish_reason: Some(finish_reason),
        }
    }

    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Generation capability errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl GenerationError {
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. }
                | GenerationError::Unavailable { .. }
                | GenerationError::Network(_)
                | GenerationError::Timeout { .. }
        )
    }
}
