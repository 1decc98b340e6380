//! Opportunistic context gathered while a request is processed.

use serde::{Deserialize, Serialize};

/// Current conditions at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub weather: String,
    pub wind_speed: f64,
}

impl WeatherSnapshot {
    /// Single line suitable for embedding in a prompt.
    pub fn describe(&self) -> String {
        format!(
            "{}: {}, {:.1}°C (feels like {:.1}°C), humidity {:.0}%, wind {:.1} m/s",
            self.city, self.weather, self.temp, self.feels_like, self.humidity, self.wind_speed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Why no search results are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentReason {
    Disabled,
    TimedOut,
    Failed,
    NoResults,
}

impl AbsentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbsentReason::Disabled => "disabled",
            AbsentReason::TimedOut => "timed_out",
            AbsentReason::Failed => "failed",
            AbsentReason::NoResults => "no_results",
        }
    }
}

/// Resolved state of the background search. Never pending.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<SearchHit>),
    Absent(AbsentReason),
}

impl SearchOutcome {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            SearchOutcome::Found(hits) => hits,
            SearchOutcome::Absent(_) => &[],
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }
}

/// Everything IntegrationStage may fold into the final answer.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentBundle {
    pub weather: Option<WeatherSnapshot>,
    pub search: SearchOutcome,
}

/// Maximum search hits embedded in a prompt.
const MAX_PROMPT_HITS: usize = 5;

impl EnrichmentBundle {
    pub fn new(weather: Option<WeatherSnapshot>, search: SearchOutcome) -> Self {
        Self { weather, search }
    }

    pub fn empty() -> Self {
        Self::new(None, SearchOutcome::Absent(AbsentReason::Disabled))
    }

    pub fn weather_text(&self) -> Option<String> {
        self.weather.as_ref().map(WeatherSnapshot::describe)
    }

    /// Numbered list of the first few hits, or `None` when nothing was found.
    pub fn search_text(&self) -> Option<String> {
        let hits = self.search.hits();
        if hits.is_empty() {
            return None;
        }

        let lines: Vec<String> = hits
            .iter()
            .take(MAX_PROMPT_HITS)
            .enumerate()
            .map(|(i, hit)| match &hit.url {
                Some(url) => format!("{}. {} - {} ({})", i + 1, hit.title, hit.snippet, url),
                None => format!("{}. {} - {}", i + 1, hit.title, hit.snippet),
            })
            .collect();
        Some(lines.join("\n"))
    }
}
