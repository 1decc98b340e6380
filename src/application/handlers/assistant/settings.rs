//! Explicit orchestrator configuration.

use std::time::Duration;

use crate::domain::assistant::DEFAULT_HISTORY_WINDOW;
use crate::ports::GenerationSettings;

/// Everything the pipeline needs to know about its environment.
///
/// Built from `AppConfig::orchestrator_config()` in the binary; tests
/// usually start from `Default` and override single fields.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Settings for the chat and integration generation calls.
    pub generation: GenerationSettings,
    pub enable_device_control: bool,
    pub enable_expert_consultation: bool,
    pub enable_weather: bool,
    pub enable_background_search: bool,
    /// Turns loaded into the session window.
    pub history_limit: usize,
    /// Turns the query rewriter may look at.
    pub rewrite_window: usize,
    /// Longest the orchestrator waits for the background search.
    pub wait_budget: Duration,
    pub generation_timeout: Duration,
    pub expert_timeout: Duration,
    pub device_timeout: Duration,
    pub weather_timeout: Duration,
    /// The search task's own timeout, independent of `wait_budget`.
    pub search_timeout: Duration,
    /// Used when no location can be extracted from the message.
    pub default_location: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            enable_device_control: true,
            enable_expert_consultation: true,
            enable_weather: true,
            enable_background_search: true,
            history_limit: DEFAULT_HISTORY_WINDOW,
            rewrite_window: 6,
            wait_budget: Duration::from_millis(1500),
            generation_timeout: Duration::from_secs(60),
            expert_timeout: Duration::from_secs(30),
            device_timeout: Duration::from_secs(20),
            weather_timeout: Duration::from_secs(5),
            search_timeout: Duration::from_secs(8),
            default_location: "Shanghai".to_string(),
        }
    }
}
