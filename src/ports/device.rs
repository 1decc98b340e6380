//! Device control port.
//!
//! The device service interprets a natural-language command and operates
//! pond equipment. It may report progress through the same chunk sink
//! contract the generation capability uses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::SessionId;

use super::{CapabilityError, ChunkSink};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceResult {
    #[serde(default)]
    pub messages: Vec<DeviceMessage>,
}

/// Structured reply from the device service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceResponse {
    pub success: bool,
    pub result: Option<DeviceResult>,
    pub device_type: Option<String>,
    pub error: Option<String>,
}

impl DeviceResponse {
    /// Successful reply carrying a single message.
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            result: Some(DeviceResult {
                messages: vec![DeviceMessage { content: message.into() }],
            }),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    /// First non-blank message, if any.
    pub fn first_message(&self) -> Option<&str> {
        self.result
            .as_ref()?
            .messages
            .iter()
            .map(|m| m.content.trim())
            .find(|c| !c.is_empty())
    }
}

#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn consult(
        &self,
        query: &str,
        session_id: &SessionId,
        context: &BTreeMap<String, String>,
        sink: Option<&dyn ChunkSink>,
    ) -> Result<DeviceResponse, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_skips_blank_entries() {
        let response = DeviceResponse {
            success: true,
            result: Some(DeviceResult {
                messages: vec![
                    DeviceMessage { content: "  ".into() },
                    DeviceMessage { content: "Aerator activated".into() },
                ],
            }),
            ..Default::default()
        };
        assert_eq!(response.first_message(), Some("Aerator activated"));
    }

    #[test]
    fn missing_result_has_no_message() {
        assert_eq!(DeviceResponse::failed("offline").first_message(), None);
    }

    #[test]
    fn deserializes_sparse_payloads() {
        let response: DeviceResponse =
            serde_json::from_str(r#"{"success":true,"result":{"messages":[{"content":"ok"}]}}"#).unwrap();
        assert_eq!(response.first_message(), Some("ok"));
        assert!(response.device_type.is_none());
    }
}
