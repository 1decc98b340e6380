//! OpenAI-compatible generation provider.
//!
//! Talks to any `/chat/completions` endpoint that follows the OpenAI wire
//! format (DashScope compatible mode by default, which serves the `qwen`
//! family and honours `enable_search`).
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenAIConfig::new(api_key)
//!     .with_model("qwen-plus")
//!     .with_base_url("https://dashscope.aliyuncs.com/compatible-mode/v1");
//!
//! let provider = OpenAIProvider::new(config)?;
//! ```
//!
//! # Streaming
//!
//! Uses Server-Sent Events. Lines are reassembled across network chunks
//! and each `data:` payload is yielded as a `StreamChunk` until `[DONE]`.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    FinishReason, GenerationError, GenerationProvider, GenerationRequest, GenerationResponse,
    GenerationStream, MessageRole, StreamChunk,
};

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Configuration for the OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    api_key: Secret<String>,
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries on transient failures (buffered calls only).
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry.
    pub initial_backoff: Duration,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// OpenAI-compatible provider implementation.
pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Converts our request to the wire format.
    fn to_wire_request(&self, request: &GenerationRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref prompt) = request.system_prompt {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: prompt.clone(),
            });
        }

        for msg in &request.messages {
            messages.push(WireMessage {
                role: match msg.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: msg.content.clone(),
            });
        }

        ChatRequest {
            model: request.settings.model.clone(),
            messages,
            max_tokens: Some(request.settings.max_tokens),
            temperature: Some(request.settings.temperature),
            stream: Some(stream),
            enable_search: request.settings.enable_search.then_some(true),
        }
    }

    async fn send(&self, request: &GenerationRequest, stream: bool) -> Result<Response, GenerationError> {
        let wire = self.to_wire_request(request, stream);

        self.client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("Content-Type", "application/json")
            .json(&wire)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    }
                } else if e.is_connect() {
                    GenerationError::network(format!("Connection failed: {}", e))
                } else {
                    GenerationError::network(e.to_string())
                }
            })
    }

    /// Maps non-success statuses to errors.
    async fn handle_response_status(response: Response) -> Result<Response, GenerationError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => Err(GenerationError::AuthenticationFailed),
            429 => Err(GenerationError::rate_limited(parse_retry_after(&error_body))),
            400 => Err(GenerationError::InvalidRequest(error_body)),
            500..=599 => Err(GenerationError::unavailable(format!(
                "Server error {}: {}",
                status, error_body
            ))),
            _ => Err(GenerationError::network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }

    async fn parse_response(response: Response) -> Result<GenerationResponse, GenerationError> {
        let response = Self::handle_response_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::parse(format!("Failed to parse response: {}", e)))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::parse("No choices in response"))?;

        Ok(GenerationResponse {
            content: choice.message.content,
            model: body.model,
            finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
        })
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let response = self.send(request, false).await?;
        Self::parse_response(response).await
    }
}

#[async_trait]
impl GenerationProvider for OpenAIProvider {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let mut retry_count = 0;

        loop {
            match self.attempt(&request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && retry_count < self.config.max_retries => {
                    let delay = self.config.initial_backoff * (1 << retry_count);
                    tracing::warn!(
                        error = %err,
                        attempt = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        purpose = request.metadata.purpose,
                        "Generation failed, retrying"
                    );
                    sleep(delay).await;
                    retry_count += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn stream_complete(&self, request: GenerationRequest) -> Result<GenerationStream, GenerationError> {
        let response = self.send(&request, true).await?;
        let response = Self::handle_response_status(response).await?;

        let stream = response
            .bytes_stream()
            .scan(SseLineBuffer::default(), |buffer, chunk| {
                let items: Vec<Result<StreamChunk, GenerationError>> = match chunk {
                    Ok(bytes) => buffer
                        .push(&bytes)
                        .iter()
                        .filter_map(|line| parse_sse_line(line))
                        .collect(),
                    Err(e) => vec![Err(GenerationError::network(format!("Stream error: {}", e)))],
                };
                futures::future::ready(Some(items))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &str {
        "openai-compatible"
    }
}

/// Reassembles complete lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: String,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let mut lines = Vec::new();
        while let Some(idx) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=idx).collect();
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

/// Parses one SSE line. Non-data lines and `[DONE]` yield nothing.
fn parse_sse_line(line: &str) -> Option<Result<StreamChunk, GenerationError>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let chunk = match serde_json::from_str::<StreamResponseChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => return Some(Err(GenerationError::parse(format!("Failed to parse SSE chunk: {}", e)))),
    };

    let choice = chunk.choices.into_iter().next()?;
    if let Some(reason) = choice.finish_reason {
        let mut last = StreamChunk::final_chunk(parse_finish_reason(Some(&reason)));
        last.delta = choice.delta.content.unwrap_or_default();
        return Some(Ok(last));
    }

    match choice.delta.content {
        Some(content) if !content.is_empty() => Some(Ok(StreamChunk::content(content))),
        _ => None,
    }
}

fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

/// Extracts "try again in Ns" from an error body, defaulting to 30s.
fn parse_retry_after(error_body: &str) -> u32 {
    serde_json::from_str::<serde_json::Value>(error_body)
        .ok()
        .and_then(|parsed| {
            let message = parsed.get("error")?.get("message")?.as_str()?.to_string();
            let rest = &message[message.find("try again in ")? + 13..];
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        })
        .unwrap_or(30)
}

// ----- Wire Types -----

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_search: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponseChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{GenerationSettings, RequestMetadata};

    fn provider() -> OpenAIProvider {
        OpenAIProvider::new(OpenAIConfig::new("test-key")).unwrap()
    }

    #[test]
    fn config_builder_works() {
        let config = OpenAIConfig::new("test-key")
            .with_base_url("https://custom.api.com/v1/")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.base_url, "https://custom.api.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn wire_request_carries_settings_and_system_prompt() {
        let settings = GenerationSettings {
            enable_search: true,
            ..GenerationSettings::default()
        };
        let request = GenerationRequest::new(settings, RequestMetadata::new("chat"))
            .with_system_prompt("persona")
            .with_message(MessageRole::User, "hi");

        let wire = provider().to_wire_request(&request, true);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["model"], "qwen-plus");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["stream"], true);
        assert_eq!(json["enable_search"], true);
    }

    #[test]
    fn enable_search_omitted_when_off() {
        let request = GenerationRequest::new(GenerationSettings::default(), RequestMetadata::new("chat"));
        let json = serde_json::to_value(provider().to_wire_request(&request, false)).unwrap();
        assert!(json.get("enable_search").is_none());
    }

    mod sse {
        use super::*;

        #[test]
        fn content_chunk() {
            let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
            let chunk = parse_sse_line(line).unwrap().unwrap();
            assert_eq!(chunk.delta, "Hello");
            assert!(!chunk.is_final());
        }

        #[test]
        fn final_chunk_keeps_trailing_content() {
            let line = r#"data: {"choices":[{"delta":{"content":"!"},"finish_reason":"stop"}]}"#;
            let chunk = parse_sse_line(line).unwrap().unwrap();
            assert!(chunk.is_final());
            assert_eq!(chunk.delta, "!");
        }

        #[test]
        fn done_marker_and_comments_are_skipped() {
            assert!(parse_sse_line("data: [DONE]").is_none());
            assert!(parse_sse_line(": keep-alive").is_none());
            assert!(parse_sse_line("").is_none());
        }

        #[test]
        fn malformed_payload_is_a_parse_error() {
            let result = parse_sse_line("data: {not json").unwrap();
            assert!(matches!(result, Err(GenerationError::Parse(_))));
        }

        #[test]
        fn line_buffer_joins_split_lines() {
            let mut buffer = SseLineBuffer::default();
            assert!(buffer.push(b"data: {\"cho").is_empty());
            let lines = buffer.push(b"ices\":[]}\r\ndata: [DONE]\n");
            assert_eq!(lines, vec!["data: {\"choices\":[]}", "data: [DONE]"]);
        }
    }

    #[test]
    fn parse_retry_after_from_message() {
        let error = r#"{"error":{"message":"Rate limit exceeded. Please try again in 12 seconds."}}"#;
        assert_eq!(parse_retry_after(error), 12);
    }

    #[test]
    fn parse_retry_after_default() {
        assert_eq!(parse_retry_after(r#"{"error":{"message":"nope"}}"#), 30);
        assert_eq!(parse_retry_after("not json"), 30);
    }
}
