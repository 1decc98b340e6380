//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the orchestrator and the outside world. Adapters implement these ports.
//!
//! - `GenerationProvider` - text generation, buffered or streamed
//! - `HistoryLog` - append-only conversation turns
//! - `ExpertConsultant`, `DeviceController` - branch capabilities
//! - `WeatherProvider`, `SearchProvider` - enrichment capabilities
//! - `ChunkSink` - streaming delivery seam

mod capability;
mod chunk_sink;
mod device;
mod expert;
mod generation;
mod history_log;
mod search;
mod weather;

pub use capability::CapabilityError;
pub use chunk_sink::{ChunkSink, SinkError};
pub use device::{DeviceController, DeviceMessage, DeviceResponse, DeviceResult};
pub use expert::{ExpertConsultant, ExpertQuery, ExpertResponse};
pub use generation::{
    FinishReason, GenerationError, GenerationProvider, GenerationRequest, GenerationResponse,
    GenerationSettings, GenerationStream, Message, MessageRole, RequestMetadata, StreamChunk,
    purpose,
};
pub use history_log::HistoryLog;
pub use search::{SearchProvider, SearchResponse};
pub use weather::WeatherProvider;
