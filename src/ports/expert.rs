//! Expert consultation port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::SessionId;

use super::{CapabilityError, GenerationSettings};

/// Question forwarded to the domain expert service.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpertQuery {
    pub query: String,
    pub context: BTreeMap<String, String>,
    pub session_id: SessionId,
    pub settings: GenerationSettings,
}

/// Answer from the expert service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpertResponse {
    pub success: bool,
    pub answer: String,
    pub confidence: Option<f64>,
    pub sources: Vec<String>,
    pub error: Option<String>,
}

impl ExpertResponse {
    pub fn answered(answer: impl Into<String>) -> Self {
        Self {
            success: true,
            answer: answer.into(),
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
}

#[async_trait]
pub trait ExpertConsultant: Send + Sync {
    /// `success=false` is a normal answer, not an error.
    async fn consult(&self, query: ExpertQuery) -> Result<ExpertResponse, CapabilityError>;
}
