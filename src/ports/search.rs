//! Web search port used by the background search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::assistant::SearchHit;

use super::CapabilityError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchHit>,
}

impl SearchResponse {
    pub fn with_results(results: Vec<SearchHit>) -> Self {
        Self { success: true, results }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, CapabilityError>;
}
