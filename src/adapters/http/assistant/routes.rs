//! Axum routes for assistant endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{get_history, health, post_chat, AssistantAppState};
use super::ws_handler::chat_stream_handler;

/// Creates routes for assistant endpoints.
///
/// - POST /api/chat - buffered chat
/// - GET /api/sessions/:session_id/history - session history
/// - GET /api/chat/stream - WebSocket streaming chat
pub fn assistant_routes() -> Router<AssistantAppState> {
    Router::new()
        .route("/chat", post(post_chat))
        .route("/chat/stream", get(chat_stream_handler))
        .route("/sessions/:session_id/history", get(get_history))
}

/// Combined router: assistant routes under /api plus /health.
pub fn assistant_router() -> Router<AssistantAppState> {
    Router::new()
        .nest("/api", assistant_routes())
        .route("/health", get(health))
}
