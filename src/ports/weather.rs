//! Weather lookup port.

use async_trait::async_trait;

use crate::domain::assistant::WeatherSnapshot;

use super::CapabilityError;

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions, or `None` when the location is unknown.
    async fn get_weather(&self, location: &str) -> Result<Option<WeatherSnapshot>, CapabilityError>;
}
