//! Weather client for OpenWeatherMap-compatible endpoints.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::http::{check_status, read_json, send, ServiceEndpoint};
use crate::domain::assistant::WeatherSnapshot;
use crate::ports::{CapabilityError, WeatherProvider};

const CAPABILITY: &str = "weather";

pub struct HttpWeatherProvider {
    endpoint: ServiceEndpoint,
    client: Client,
}

impl HttpWeatherProvider {
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self, CapabilityError> {
        let client = endpoint.client(CAPABILITY)?;
        Ok(Self { endpoint, client })
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: String,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default)]
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f64,
}

impl From<CurrentWeather> for WeatherSnapshot {
    fn from(current: CurrentWeather) -> Self {
        Self {
            city: current.name,
            temp: current.main.temp,
            feels_like: current.main.feels_like,
            humidity: current.main.humidity,
            weather: current
                .weather
                .into_iter()
                .next()
                .map(|c| c.description)
                .unwrap_or_else(|| "unknown".to_string()),
            wind_speed: current.wind.speed,
        }
    }
}

#[async_trait]
impl WeatherProvider for HttpWeatherProvider {
    async fn get_weather(&self, location: &str) -> Result<Option<WeatherSnapshot>, CapabilityError> {
        let mut query = vec![("q", location), ("units", "metric")];
        if let Some(key) = self.endpoint.api_key() {
            query.push(("appid", key));
        }

        let request = self.client.get(self.endpoint.url("weather")).query(&query);
        let response = send(CAPABILITY, self.endpoint.timeout, request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(CAPABILITY, response).await?;
        let current: CurrentWeather = read_json(CAPABILITY, response).await?;
        Ok(Some(current.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_provider_payload() {
        let payload = r#"{
            "name": "Wuxi",
            "main": {"temp": 18.5, "feels_like": 17.9, "humidity": 72},
            "weather": [{"description": "overcast clouds"}],
            "wind": {"speed": 4.1}
        }"#;
        let current: CurrentWeather = serde_json::from_str(payload).unwrap();
        let snapshot = WeatherSnapshot::from(current);

        assert_eq!(snapshot.city, "Wuxi");
        assert_eq!(snapshot.weather, "overcast clouds");
        assert_eq!(snapshot.humidity, 72.0);
        assert_eq!(snapshot.wind_speed, 4.1);
    }

    #[test]
    fn missing_conditions_default() {
        let payload = r#"{"name": "X", "main": {"temp": 1, "feels_like": 1, "humidity": 1}}"#;
        let snapshot = WeatherSnapshot::from(serde_json::from_str::<CurrentWeather>(payload).unwrap());
        assert_eq!(snapshot.weather, "unknown");
        assert_eq!(snapshot.wind_speed, 0.0);
    }
}
