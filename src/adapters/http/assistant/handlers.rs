//! HTTP handlers for assistant endpoints.

use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::{ChatRequest, RequestOrchestrator};
use crate::domain::foundation::{SessionId, ValidationError};

use super::dto::{ChatRequestDto, ChatResponse, ErrorResponse, HealthResponse, HistoryParams, HistoryResponse};

const DEFAULT_OUTBOUND_BUFFER: usize = 64;
const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for assistant handlers.
#[derive(Clone)]
pub struct AssistantAppState {
    pub orchestrator: Arc<RequestOrchestrator>,
    /// When false the WebSocket endpoint refuses upgrades.
    pub enable_streaming: bool,
    /// Include internal error detail in response metadata.
    pub verbose_errors: bool,
    /// Frames queued per WebSocket before the pipeline waits on the writer.
    pub outbound_buffer: usize,
    pub max_message_bytes: usize,
}

impl AssistantAppState {
    pub fn new(orchestrator: Arc<RequestOrchestrator>) -> Self {
        Self {
            orchestrator,
            enable_streaming: true,
            verbose_errors: false,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.enable_streaming = enabled;
        self
    }

    pub fn with_verbose_errors(mut self, verbose: bool) -> Self {
        self.verbose_errors = verbose;
        self
    }

    pub fn with_stream_limits(mut self, outbound_buffer: usize, max_message_bytes: usize) -> Self {
        self.outbound_buffer = outbound_buffer.max(1);
        self.max_message_bytes = max_message_bytes;
        self
    }
}

/// Builds a validated request from wire fields.
pub(crate) fn chat_request(
    session_id: &str,
    message: &str,
    context: Option<std::collections::BTreeMap<String, String>>,
) -> Result<ChatRequest, ValidationError> {
    let request = ChatRequest::new(session_id, message)?;
    Ok(match context {
        Some(context) => request.with_context(context),
        None => request,
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// POST /api/chat
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/chat - buffered chat.
///
/// Pipeline failures are reported in the body (`status: "error"`) with a
/// 200, since an assistant turn was still produced.
///
/// # Errors
/// - 400 Bad Request: invalid session id or message
pub async fn post_chat(
    State(state): State<AssistantAppState>,
    Json(body): Json<ChatRequestDto>,
) -> Result<impl IntoResponse, AssistantApiError> {
    let request = chat_request(&body.session_id, &body.message, body.context)?;
    let result = state.orchestrator.process(request, None).await;
    Ok((StatusCode::OK, Json(ChatResponse::from_result(result, state.verbose_errors))))
}

// ════════════════════════════════════════════════════════════════════════════════
// GET /api/sessions/:session_id/history
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/sessions/:session_id/history - ordered turns of a session.
///
/// Unknown sessions return an empty list.
pub async fn get_history(
    State(state): State<AssistantAppState>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AssistantApiError> {
    let session_id = SessionId::new(session_id)?;
    let turns = state
        .orchestrator
        .history(&session_id, params.effective_limit())
        .await
        .map_err(|e| AssistantApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(HistoryResponse {
            session_id: session_id.to_string(),
            turns: turns.into_iter().map(Into::into).collect(),
        }),
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// GET /health
// ════════════════════════════════════════════════════════════════════════════════

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::ok()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts failures to HTTP responses.
#[derive(Debug)]
pub enum AssistantApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<ValidationError> for AssistantApiError {
    fn from(err: ValidationError) -> Self {
        AssistantApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AssistantApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            AssistantApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::bad_request(msg)),
            AssistantApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::not_found(msg)),
            AssistantApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::internal("An internal error occurred"))
            }
        };

        (status, Json(error)).into_response()
    }
}
