//! HTTP client for the device-control service.
//!
//! Without a sink the service answers with one JSON document. With a sink
//! it answers with newline-delimited JSON events: `{"type":"chunk",...}`
//! progress lines followed by one `{"type":"result",...}` line.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::http::{check_status, read_json, send, ServiceEndpoint};
use crate::domain::foundation::SessionId;
use crate::ports::{CapabilityError, ChunkSink, DeviceController, DeviceResponse};

const CAPABILITY: &str = "device";

pub struct HttpDeviceController {
    endpoint: ServiceEndpoint,
    client: Client,
}

impl HttpDeviceController {
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self, CapabilityError> {
        let client = endpoint.client(CAPABILITY)?;
        Ok(Self { endpoint, client })
    }
}

#[derive(Debug, Serialize)]
struct ConsultBody<'a> {
    query: &'a str,
    session_id: &'a str,
    context: &'a BTreeMap<String, String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeviceEvent {
    Chunk { content: String },
    Result(DeviceResponse),
}

/// Parses one NDJSON line. Blank lines yield nothing.
fn parse_event(line: &str) -> Option<Result<DeviceEvent, CapabilityError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str(line)
            .map_err(|e| CapabilityError::parse(format!("device: invalid event line: {}", e))),
    )
}

#[async_trait]
impl DeviceController for HttpDeviceController {
    async fn consult(
        &self,
        query: &str,
        session_id: &SessionId,
        context: &BTreeMap<String, String>,
        sink: Option<&dyn ChunkSink>,
    ) -> Result<DeviceResponse, CapabilityError> {
        let body = ConsultBody {
            query,
            session_id: session_id.as_str(),
            context,
            stream: sink.is_some(),
        };
        let request = self
            .endpoint
            .authorize(self.client.post(self.endpoint.url("consult")))
            .json(&body);

        let response = send(CAPABILITY, self.endpoint.timeout, request).await?;
        let response = check_status(CAPABILITY, response).await?;

        let Some(sink) = sink else {
            return read_json(CAPABILITY, response).await;
        };

        let mut bytes = response.bytes_stream();
        let mut pending = String::new();
        let mut result = None;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| CapabilityError::network(format!("device: stream error: {}", e)))?;
            pending.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(idx) = pending.find('\n') {
                let line: String = pending.drain(..=idx).collect();
                match parse_event(&line).transpose()? {
                    Some(DeviceEvent::Chunk { content }) => {
                        if sink.send_chunk(&content).await.is_err() {
                            tracing::debug!(session_id = %session_id, "Device progress sink closed");
                        }
                    }
                    Some(DeviceEvent::Result(response)) => result = Some(response),
                    None => {}
                }
            }
        }

        if let Some(DeviceEvent::Result(response)) = parse_event(&pending).transpose()? {
            result = Some(response);
        }

        result.ok_or_else(|| CapabilityError::parse("device: stream ended without a result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chunk_and_result_events() {
        let chunk = parse_event(r#"{"type":"chunk","content":"starting"}"#).unwrap().unwrap();
        assert!(matches!(chunk, DeviceEvent::Chunk { ref content } if content == "starting"));

        let result = parse_event(
            r#"{"type":"result","success":true,"result":{"messages":[{"content":"Aerator activated"}]},"device_type":"aerator"}"#,
        )
        .unwrap()
        .unwrap();
        match result {
            DeviceEvent::Result(response) => {
                assert_eq!(response.first_message(), Some("Aerator activated"));
                assert_eq!(response.device_type.as_deref(), Some("aerator"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(parse_event("   \n").is_none());
    }

    #[test]
    fn malformed_lines_are_parse_errors() {
        assert!(matches!(parse_event("{oops"), Some(Err(CapabilityError::Parse(_)))));
    }
}
