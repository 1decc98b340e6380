//! Pipeline tuning: history windows, deadlines and the search wait budget

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Turns loaded into the session window
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Turns the query rewriter looks at
    #[serde(default = "default_rewrite_window")]
    pub rewrite_window: usize,

    /// How long the orchestrator waits for the background search
    #[serde(default = "default_wait_budget")]
    pub wait_budget_ms: u64,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_ms: u64,

    #[serde(default = "default_expert_timeout")]
    pub expert_timeout_ms: u64,

    #[serde(default = "default_device_timeout")]
    pub device_timeout_ms: u64,

    #[serde(default = "default_weather_timeout")]
    pub weather_timeout_ms: u64,

    #[serde(default = "default_search_timeout")]
    pub search_timeout_ms: u64,

    /// Weather location when the message names none
    #[serde(default = "default_location")]
    pub default_location: String,
}

impl PipelineConfig {
    pub fn wait_budget(&self) -> Duration {
        Duration::from_millis(self.wait_budget_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn expert_timeout(&self) -> Duration {
        Duration::from_millis(self.expert_timeout_ms)
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_millis(self.device_timeout_ms)
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_millis(self.weather_timeout_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.history_limit == 0 {
            return Err(ValidationError::InvalidPipeline("history_limit must be positive"));
        }
        if self.rewrite_window > self.history_limit {
            return Err(ValidationError::InvalidPipeline(
                "rewrite_window cannot exceed history_limit",
            ));
        }
        let deadlines = [
            self.wait_budget_ms,
            self.generation_timeout_ms,
            self.expert_timeout_ms,
            self.device_timeout_ms,
            self.weather_timeout_ms,
            self.search_timeout_ms,
        ];
        if deadlines.contains(&0) {
            return Err(ValidationError::InvalidPipeline("timeouts must be positive"));
        }
        if self.default_location.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PIPELINE__DEFAULT_LOCATION"));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            rewrite_window: default_rewrite_window(),
            wait_budget_ms: default_wait_budget(),
            generation_timeout_ms: default_generation_timeout(),
            expert_timeout_ms: default_expert_timeout(),
            device_timeout_ms: default_device_timeout(),
            weather_timeout_ms: default_weather_timeout(),
            search_timeout_ms: default_search_timeout(),
            default_location: default_location(),
        }
    }
}

fn default_history_limit() -> usize {
    20
}

fn default_rewrite_window() -> usize {
    6
}

fn default_wait_budget() -> u64 {
    1500
}

fn default_generation_timeout() -> u64 {
    60_000
}

fn default_expert_timeout() -> u64 {
    30_000
}

fn default_device_timeout() -> u64 {
    20_000
}

fn default_weather_timeout() -> u64 {
    5_000
}

fn default_search_timeout() -> u64 {
    8_000
}

fn default_location() -> String {
    "Shanghai".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.wait_budget(), Duration::from_millis(1500));
        assert_eq!(config.search_timeout(), Duration::from_secs(8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = PipelineConfig {
            weather_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPipeline(_))));
    }

    #[test]
    fn test_rewrite_window_bounded_by_history() {
        let config = PipelineConfig {
            history_limit: 4,
            rewrite_window: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
