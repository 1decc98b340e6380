//! Chunk sink port - where streamed text goes.
//!
//! The delivery adapter supplies a sink; producers push chunks into it in
//! production order. A sink belongs to exactly one request at a time.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The receiving connection is gone. Producers should stop.
    #[error("chunk sink closed")]
    Closed,
}

#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn send_chunk(&self, chunk: &str) -> Result<(), SinkError>;
}
