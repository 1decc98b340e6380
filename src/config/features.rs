//! Feature flags

use serde::Deserialize;

/// Switches for the optional parts of the pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Route device-control intents to the device agent
    #[serde(default = "default_true")]
    pub enable_device_expert: bool,

    #[serde(default = "default_true")]
    pub enable_expert_consultation: bool,

    #[serde(default = "default_true")]
    pub enable_weather: bool,

    #[serde(default = "default_true")]
    pub enable_background_search: bool,

    /// Expose `GET /api/chat/stream`
    #[serde(default = "default_true")]
    pub enable_streaming: bool,

    /// Include internal error text in responses
    #[serde(default)]
    pub verbose_errors: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_device_expert: true,
            enable_expert_consultation: true,
            enable_weather: true,
            enable_background_search: true,
            enable_streaming: true,
            verbose_errors: false,
        }
    }
}

fn default_true() -> bool {
    true
}
