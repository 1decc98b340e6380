//! Streaming protocol for the assistant WebSocket.
//!
//! Client messages are tagged by `type`; server messages are tagged by
//! `event`. An answer is framed as one `start`, any number of `content`
//! frames and one `end`, all sharing a message id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use crate::application::{ChatRequest, ProcessResult, RequestOrchestrator};
use crate::domain::assistant::StreamFrame;
use crate::domain::foundation::{MessageId, SessionId, Timestamp};
use crate::ports::{ChunkSink, SinkError};

// ════════════════════════════════════════════════════════════════════════════════
// Client → Server
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamClientMessage {
    SendMessage {
        session_id: String,
        content: String,
        #[serde(default)]
        context: Option<BTreeMap<String, String>>,
    },
    Ping,
}

// ════════════════════════════════════════════════════════════════════════════════
// Server → Client
// ════════════════════════════════════════════════════════════════════════════════

/// Frames that are not part of an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlFrame {
    Pong { timestamp: Timestamp },
    Error { code: String, message: String },
}

/// Everything the server writes to the socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Frame(StreamFrame),
    Control(ControlFrame),
}

impl ServerMessage {
    pub fn pong() -> Self {
        ServerMessage::Control(ControlFrame::Pong {
            timestamp: Timestamp::now(),
        })
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Control(ControlFrame::Error {
            code: code.into(),
            message: message.into(),
        })
    }

    pub fn as_frame(&self) -> Option<&StreamFrame> {
        match self {
            ServerMessage::Frame(frame) => Some(frame),
            ServerMessage::Control(_) => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Chunk Sink
// ════════════════════════════════════════════════════════════════════════════════

/// Turns chunks into `content` frames on the connection's outbound queue.
///
/// Reports `Closed` once the writer side has gone away.
pub struct ChannelSink {
    tx: mpsc::Sender<ServerMessage>,
    message_id: MessageId,
    session_id: SessionId,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ServerMessage>, message_id: MessageId, session_id: SessionId) -> Self {
        Self {
            tx,
            message_id,
            session_id,
        }
    }

    async fn push(&self, frame: StreamFrame) -> Result<(), SinkError> {
        self.tx
            .send(ServerMessage::Frame(frame))
            .await
            .map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn send_chunk(&self, chunk: &str) -> Result<(), SinkError> {
        self.push(StreamFrame::content(self.message_id, self.session_id.clone(), chunk))
            .await
    }
}

/// Streams one answer: `start`, the content frames produced while the
/// orchestrator runs, then `end` with the result summary.
pub async fn stream_reply(
    orchestrator: &RequestOrchestrator,
    request: ChatRequest,
    tx: mpsc::Sender<ServerMessage>,
    verbose_errors: bool,
) -> ProcessResult {
    let message_id = MessageId::new();
    let session_id = request.session_id.clone();
    let sink = ChannelSink::new(tx, message_id, session_id.clone());

    if sink.push(StreamFrame::start(message_id, session_id.clone())).await.is_err() {
        tracing::debug!(session_id = %session_id, "Connection gone before start frame");
    }

    let result = orchestrator.process(request, Some(&sink)).await;

    let mut metadata = result.metadata.clone();
    if !verbose_errors {
        metadata.error = None;
    }
    let summary = StreamFrame::end_summary(
        result.status.as_str(),
        result.intent.map(|intent| intent.as_str()),
        result.response.chars().count(),
        serde_json::to_value(&metadata).unwrap_or_default(),
    );
    if sink.push(StreamFrame::end(message_id, session_id, summary)).await.is_err() {
        tracing::debug!("Connection gone before end frame");
    }

    result
}
