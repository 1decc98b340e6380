//! HTTP client for the web search service.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::http::{check_status, read_json, send, ServiceEndpoint};
use crate::ports::{CapabilityError, SearchProvider, SearchResponse};

const CAPABILITY: &str = "search";
const MAX_RESULTS: usize = 5;

pub struct HttpSearchProvider {
    endpoint: ServiceEndpoint,
    client: Client,
}

impl HttpSearchProvider {
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self, CapabilityError> {
        let client = endpoint.client(CAPABILITY)?;
        Ok(Self { endpoint, client })
    }
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    max_results: usize,
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Result<SearchResponse, CapabilityError> {
        let request = self
            .endpoint
            .authorize(self.client.post(self.endpoint.url("search")))
            .json(&SearchBody {
                query,
                max_results: MAX_RESULTS,
            });

        let response = send(CAPABILITY, self.endpoint.timeout, request).await?;
        let response = check_status(CAPABILITY, response).await?;
        read_json(CAPABILITY, response).await
    }
}
