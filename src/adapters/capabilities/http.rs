//! Shared plumbing for the reqwest-based capability clients.

use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

use crate::ports::CapabilityError;

/// Connection settings for one capability service.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub base_url: String,
    api_key: Option<Secret<String>>,
    pub timeout: Duration,
}

impl ServiceEndpoint {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(api_key.into()));
        self
    }

    pub(crate) fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|k| k.expose_secret().as_str())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn client(&self, capability: &'static str) -> Result<Client, CapabilityError> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| CapabilityError::unavailable(format!("{}: failed to build HTTP client: {}", capability, e)))
    }

    /// Adds bearer authentication when a key is configured.
    pub(crate) fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.api_key() {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Sends a request, mapping transport failures.
pub(crate) async fn send(
    capability: &'static str,
    timeout: Duration,
    builder: RequestBuilder,
) -> Result<Response, CapabilityError> {
    builder.send().await.map_err(|e| {
        if e.is_timeout() {
            CapabilityError::timeout(capability, timeout.as_millis() as u64)
        } else if e.is_connect() {
            CapabilityError::network(format!("{}: connection failed: {}", capability, e))
        } else {
            CapabilityError::network(format!("{}: {}", capability, e))
        }
    })
}

/// Maps non-success statuses to `Rejected` / `Unavailable`.
pub(crate) async fn check_status(capability: &'static str, response: Response) -> Result<Response, CapabilityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(CapabilityError::unavailable(format!("{} returned {}: {}", capability, status, body)))
    } else {
        Err(CapabilityError::Rejected {
            status: status.as_u16(),
            message: body,
        })
    }
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    capability: &'static str,
    response: Response,
) -> Result<T, CapabilityError> {
    response
        .json::<T>()
        .await
        .map_err(|e| CapabilityError::parse(format!("{}: invalid response body: {}", capability, e)))
}
