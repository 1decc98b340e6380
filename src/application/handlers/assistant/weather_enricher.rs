//! WeatherEnricher - optional current-conditions lookup.
//!
//! Two stages: a yes/no relevance check through the generation capability,
//! then a bounded weather lookup for the extracted location. Every failure
//! resolves to `None`.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::domain::assistant::WeatherSnapshot;
use crate::ports::{
    purpose, GenerationProvider, GenerationRequest, GenerationSettings, MessageRole, RequestMetadata,
    WeatherProvider,
};

use super::prompts::WEATHER_RELEVANCE_SYSTEM;
use super::support::complete_within;

/// Words that introduce a place name ("weather in Wuxi").
const LOCATION_MARKERS: [&str; 5] = ["in", "at", "for", "near", "around"];

pub struct WeatherEnricher {
    generation: Arc<dyn GenerationProvider>,
    weather: Option<Arc<dyn WeatherProvider>>,
    settings: GenerationSettings,
    enabled: bool,
    default_location: String,
    generation_timeout: Duration,
    weather_timeout: Duration,
}

impl WeatherEnricher {
    pub fn new(
        generation: Arc<dyn GenerationProvider>,
        weather: Option<Arc<dyn WeatherProvider>>,
        settings: &GenerationSettings,
        enabled: bool,
        default_location: impl Into<String>,
        generation_timeout: Duration,
        weather_timeout: Duration,
    ) -> Self {
        Self {
            generation,
            weather,
            settings: GenerationSettings {
                temperature: 0.0,
                max_tokens: 4,
                enable_search: false,
                ..settings.clone()
            },
            enabled,
            default_location: default_location.into(),
            generation_timeout,
            weather_timeout,
        }
    }

    /// Weather is attempted only when switched on and a provider is wired.
    pub fn is_configured(&self) -> bool {
        self.enabled && self.weather.is_some()
    }

    pub async fn maybe_enrich(&self, text: &str) -> Option<WeatherSnapshot> {
        let provider = match &self.weather {
            Some(provider) if self.enabled => provider,
            _ => return None,
        };

        if !self.is_relevant(text).await {
            return None;
        }

        let location = extract_location(text, &self.default_location);
        match timeout(self.weather_timeout, provider.get_weather(&location)).await {
            Ok(Ok(Some(snapshot))) => {
                tracing::debug!(location = %location, "Weather snapshot attached");
                Some(snapshot)
            }
            Ok(Ok(None)) => {
                tracing::info!(location = %location, "No weather for location");
                None
            }
            Ok(Err(err)) => {
                tracing::warn!(location = %location, error = %err, "Weather lookup failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    location = %location,
                    timeout_ms = self.weather_timeout.as_millis() as u64,
                    "Weather lookup timed out"
                );
                None
            }
        }
    }

    async fn is_relevant(&self, text: &str) -> bool {
        let request = GenerationRequest::new(self.settings.clone(), RequestMetadata::new(purpose::WEATHER_RELEVANCE))
            .with_system_prompt(WEATHER_RELEVANCE_SYSTEM)
            .with_message(MessageRole::User, text);

        match complete_within(self.generation.as_ref(), request, self.generation_timeout).await {
            Ok(answer) => parse_yes_no(&answer),
            Err(err) => {
                tracing::warn!(error = %err, "Weather relevance check failed");
                false
            }
        }
    }
}

fn parse_yes_no(answer: &str) -> bool {
    let normalized = answer.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    normalized.starts_with("yes") || normalized == "true" || normalized == "y"
}

/// Finds a capitalized place name after a location marker.
///
/// Consecutive capitalized words are joined ("New Orleans"). Falls back to
/// `default` when nothing qualifies, so the result is never empty as long
/// as `default` isn't.
pub fn extract_location(text: &str, default: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();

    for (i, word) in words.iter().enumerate() {
        let marker = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if !LOCATION_MARKERS.contains(&marker.as_str()) {
            continue;
        }

        let mut parts = Vec::new();
        for candidate in &words[i + 1..] {
            let cleaned = candidate.trim_matches(|c: char| !c.is_alphanumeric());
            let capitalized = cleaned.chars().next().is_some_and(char::is_uppercase);
            if cleaned.is_empty() || !capitalized {
                break;
            }
            parts.push(cleaned);
            if candidate.ends_with([',', '.', '?', '!', ';']) {
                break;
            }
        }

        if !parts.is_empty() {
            return parts.join(" ");
        }
    }

    default.to_string()
}
