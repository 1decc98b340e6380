//! HTTP adapter for the assistant: buffered chat, history, WebSocket
//! streaming and health.

pub mod dto;
pub mod handlers;
pub mod routes;
pub mod streaming;
pub mod ws_handler;

pub use dto::{ChatRequestDto, ChatResponse, ErrorResponse, HealthResponse, HistoryResponse, TurnView};
pub use handlers::{AssistantApiError, AssistantAppState};
pub use routes::{assistant_router, assistant_routes};
pub use streaming::{stream_reply, ChannelSink, ServerMessage, StreamClientMessage};
