//! HTTP adapters - REST and WebSocket endpoints.

pub mod assistant;

pub use assistant::{assistant_router, AssistantAppState};
