//! Adapters - Implementations of port interfaces.
//!
//! - `ai` - Generation providers (OpenAI-compatible, mock)
//! - `capabilities` - HTTP clients for expert, device, weather and search services
//! - `history` - Conversation history logs (PostgreSQL, in-memory)
//! - `http` - Axum REST and WebSocket endpoints

pub mod ai;
pub mod capabilities;
pub mod history;
pub mod http;
