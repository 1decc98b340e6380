//! Remote capability endpoints
//!
//! Each service is optional. An unset service is simply absent from the
//! pipeline, which then degrades the way it does on a failed call.

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::capabilities::ServiceEndpoint;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Endpoint description for the HTTP capability clients
    pub fn endpoint(&self, timeout: Duration) -> ServiceEndpoint {
        let endpoint = ServiceEndpoint::new(self.base_url.clone(), timeout);
        match &self.api_key {
            Some(key) if !key.expose_secret().is_empty() => endpoint.with_api_key(key.expose_secret().clone()),
            _ => endpoint,
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ValidationError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidServiceUrl(name));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapabilitiesConfig {
    pub expert: Option<ServiceConfig>,
    pub device: Option<ServiceConfig>,
    pub weather: Option<ServiceConfig>,
    pub search: Option<ServiceConfig>,
}

impl CapabilitiesConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let services = [
            ("expert", &self.expert),
            ("device", &self.device),
            ("weather", &self.weather),
            ("search", &self.search),
        ];
        for (name, service) in services {
            if let Some(service) = service {
                service.validate(name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_valid() {
        assert!(CapabilitiesConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_url_names_the_service() {
        let config = CapabilitiesConfig {
            weather: Some(ServiceConfig::new("weather.internal")),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidServiceUrl("weather")));
    }
}
