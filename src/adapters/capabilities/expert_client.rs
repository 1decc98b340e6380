//! HTTP client for the aquaculture expert service.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;

use super::http::{check_status, read_json, send, ServiceEndpoint};
use crate::ports::{CapabilityError, ExpertConsultant, ExpertQuery, ExpertResponse};

const CAPABILITY: &str = "expert";

pub struct HttpExpertConsultant {
    endpoint: ServiceEndpoint,
    client: Client,
}

impl HttpExpertConsultant {
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
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    enable_search: bool,
}

#[async_trait]
impl ExpertConsultant for HttpExpertConsultant {
    async fn consult(&self, query: ExpertQuery) -> Result<ExpertResponse, CapabilityError> {
        let body = ConsultBody {
            query: &query.query,
            session_id: query.session_id.as_str(),
            context: &query.context,
            model: &query.settings.model,
            temperature: query.settings.temperature,
            max_tokens: query.settings.max_tokens,
            enable_search: query.settings.enable_search,
        };

        let request = self
            .endpoint
            .authorize(self.client.post(self.endpoint.url("consult")))
            .json(&body);

        let response = send(CAPABILITY, self.endpoint.timeout, request).await?;
        let response = check_status(CAPABILITY, response).await?;
        read_json(CAPABILITY, response).await
    }
}
