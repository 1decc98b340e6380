//! Frames emitted by streaming delivery.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::foundation::{MessageId, SessionId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEvent {
    Start,
    Content,
    End,
}

/// One frame of a streamed answer.
///
/// A stream is exactly one `start`, zero or more `content` frames in
/// production order, and exactly one `end`, all sharing `message_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    pub event: StreamEvent,
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub timestamp: Timestamp,
    pub payload: Value,
}

impl StreamFrame {
    fn new(event: StreamEvent, message_id: MessageId, session_id: SessionId, payload: Value) -> Self {
        Self {
            event,
            message_id,
            session_id,
            timestamp: Timestamp::now(),
            payload,
        }
    }

    pub fn start(message_id: MessageId, session_id: SessionId) -> Self {
        Self::new(StreamEvent::Start, message_id, session_id, Value::Null)
    }

    /// Content frame; the payload is the chunk text itself.
    pub fn content(message_id: MessageId, session_id: SessionId, chunk: impl Into<String>) -> Self {
        Self::new(StreamEvent::Content, message_id, session_id, Value::String(chunk.into()))
    }

    pub fn end(message_id: MessageId, session_id: SessionId, summary: Value) -> Self {
        Self::new(StreamEvent::End, message_id, session_id, summary)
    }

    /// Chunk text of a content frame.
    pub fn content_text(&self) -> Option<&str> {
        match self.event {
            StreamEvent::Content => self.payload.as_str(),
            _ => None,
        }
    }

    /// Standard `end` payload.
    pub fn end_summary(status: &str, intent: Option<&str>, response_length: usize, metadata: Value) -> Value {
        json!({
            "status": status,
            "intent": intent,
            "response_length": response_length,
            "metadata": metadata,
        })
    }
}
