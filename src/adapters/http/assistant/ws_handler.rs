//! WebSocket handler for streaming chat.
//!
//! # Connection Flow
//! 1. Client upgrades on `GET /api/chat/stream`
//! 2. Client sends `send_message`; server answers with start/content/end
//! 3. Messages on one connection are handled one at a time, so frames of
//!    different answers never interleave
//! 4. When the socket stops accepting writes, the outbound queue closes and
//!    the in-flight answer is abandoned

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::handlers::{chat_request, AssistantApiError, AssistantAppState};
use super::streaming::{stream_reply, ServerMessage, StreamClientMessage};

/// Route: `GET /api/chat/stream`
pub async fn chat_stream_handler(ws: WebSocketUpgrade, State(state): State<AssistantAppState>) -> Response {
    if !state.enable_streaming {
        return AssistantApiError::NotFound("Streaming is disabled".to_string()).into_response();
    }
    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AssistantAppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.outbound_buffer);

    tracing::info!("WebSocket connection established");

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                tracing::debug!("WebSocket write failed, closing outbound queue");
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !handle_client_text(&text, &state, &tx).await {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!("Client closed connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("WebSocket error: {}", e);
                break;
            }
        }
    }

    drop(tx);
    let _ = writer.await;
    tracing::info!("WebSocket connection closed");
}

/// Handles one client message. Returns false once the connection can no
/// longer be written to.
async fn handle_client_text(text: &str, state: &AssistantAppState, tx: &mpsc::Sender<ServerMessage>) -> bool {
    let message = match serde_json::from_str::<StreamClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Failed to parse client message: {}", e);
            return tx
                .send(ServerMessage::error("BAD_REQUEST", format!("Unrecognized message: {}", e)))
                .await
                .is_ok();
        }
    };

    match message {
        StreamClientMessage::Ping => tx.send(ServerMessage::pong()).await.is_ok(),
        StreamClientMessage::SendMessage {
            session_id,
            content,
            context,
        } => {
            let request = match chat_request(&session_id, &content, context) {
                Ok(request) => request,
                Err(e) => {
                    return tx
                        .send(ServerMessage::error("BAD_REQUEST", e.to_string()))
                        .await
                        .is_ok();
                }
            };

            let result = stream_reply(&state.orchestrator, request, tx.clone(), state.verbose_errors).await;
            tracing::debug!(status = result.status.as_str(), "Streamed answer finished");
            !tx.is_closed()
        }
    }
}
