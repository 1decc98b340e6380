//! HTTP DTOs for assistant endpoints.
//!
//! These types decouple the HTTP API from domain types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::application::ProcessResult;
use crate::domain::assistant::{ConversationTurn, IntentLabel, ResponseMetadata, ResponseStatus, TurnMetadata, TurnRole};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequestDto {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub context: Option<BTreeMap<String, String>>,
}

/// Query parameters of the history endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

impl HistoryParams {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;

    /// Requested limit clamped to `1..=MAX_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Buffered chat result.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub status: ResponseStatus,
    pub response: String,
    pub intent: Option<IntentLabel>,
    pub session_id: String,
    pub metadata: ResponseMetadata,
}

impl ChatResponse {
    /// Internal error detail is dropped unless `verbose` is set.
    pub fn from_result(result: ProcessResult, verbose: bool) -> Self {
        let mut metadata = result.metadata;
        if !verbose {
            metadata.error = None;
        }
        Self {
            status: result.status,
            response: result.response,
            intent: result.intent,
            session_id: result.session_id.to_string(),
            metadata,
        }
    }
}

/// One persisted turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnView {
    pub id: String,
    pub sequence: u64,
    pub role: TurnRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentLabel>,
    pub metadata: TurnMetadata,
    pub timestamp: String,
}

impl From<ConversationTurn> for TurnView {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            id: turn.id.to_string(),
            sequence: turn.sequence,
            role: turn.role,
            content: turn.content,
            intent: turn.intent,
            metadata: turn.metadata,
            timestamp: turn.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<TurnView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "NOT_FOUND".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
        }
    }
}
