//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `AQUA_SHERPA` prefix
//! and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use aqua_sherpa::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod ai;
mod capabilities;
mod database;
mod error;
mod features;
mod pipeline;
mod server;

pub use ai::AiConfig;
pub use capabilities::{CapabilitiesConfig, ServiceConfig};
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use pipeline::PipelineConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

use crate::application::OrchestratorConfig;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// development server (in-memory history, scripted generation).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL history log; in-memory when absent
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub features: FeatureFlags,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `AQUA_SHERPA` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// - `AQUA_SHERPA__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `AQUA_SHERPA__CAPABILITIES__WEATHER__BASE_URL=...` -> `capabilities.weather.base_url`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("AQUA_SHERPA")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.ai.validate()?;
        self.pipeline.validate()?;
        self.capabilities.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }

    /// Pipeline settings handed to the request orchestrator
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            generation: self.ai.generation_settings(),
            enable_device_control: self.features.enable_device_expert,
            enable_expert_consultation: self.features.enable_expert_consultation,
            enable_weather: self.features.enable_weather,
            enable_background_search: self.features.enable_background_search,
            history_limit: self.pipeline.history_limit,
            rewrite_window: self.pipeline.rewrite_window,
            wait_budget: self.pipeline.wait_budget(),
            generation_timeout: self.pipeline.generation_timeout(),
            expert_timeout: self.pipeline.expert_timeout(),
            device_timeout: self.pipeline.device_timeout(),
            weather_timeout: self.pipeline.weather_timeout(),
            search_timeout: self.pipeline.search_timeout(),
            default_location: self.pipeline.default_location.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;
    use std::time::Duration;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "AQUA_SHERPA__SERVER__PORT",
        "AQUA_SHERPA__SERVER__ENVIRONMENT",
        "AQUA_SHERPA__SERVER__WS_OUTBOUND_BUFFER",
        "AQUA_SHERPA__DATABASE__URL",
        "AQUA_SHERPA__AI__API_KEY",
        "AQUA_SHERPA__AI__MODEL",
        "AQUA_SHERPA__FEATURES__ENABLE_WEATHER",
        "AQUA_SHERPA__PIPELINE__WAIT_BUDGET_MS",
        "AQUA_SHERPA__CAPABILITIES__WEATHER__BASE_URL",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        clear_env();
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_empty_environment_is_runnable() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
        let config = load_with(&[]).unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.database.is_none());
        assert!(!config.ai.has_api_key());
        assert!(config.capabilities.weather.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_values() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
        let config = load_with(&[
            ("AQUA_SHERPA__SERVER__PORT", "3000"),
            ("AQUA_SHERPA__SERVER__ENVIRONMENT", "production"),
            ("AQUA_SHERPA__SERVER__WS_OUTBOUND_BUFFER", "16"),
            ("AQUA_SHERPA__DATABASE__URL", "postgresql://test@localhost/aqua"),
            ("AQUA_SHERPA__AI__API_KEY", "sk-test"),
            ("AQUA_SHERPA__AI__MODEL", "qwen-max"),
            ("AQUA_SHERPA__FEATURES__ENABLE_WEATHER", "false"),
            ("AQUA_SHERPA__PIPELINE__WAIT_BUDGET_MS", "500"),
            ("AQUA_SHERPA__CAPABILITIES__WEATHER__BASE_URL", "http://weather.local"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.server.ws_outbound_buffer, 16);
        assert_eq!(config.database.as_ref().unwrap().url, "postgresql://test@localhost/aqua");
        assert_eq!(config.ai.api_key.as_ref().unwrap().expose_secret(), "sk-test");
        assert!(!config.features.enable_weather);
        assert_eq!(config.pipeline.wait_budget_ms, 500);
        assert_eq!(config.capabilities.weather.as_ref().unwrap().base_url, "http://weather.local");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_orchestrator_config_mirrors_sections() {
        let mut config = AppConfig::default();
        config.ai.model = "qwen-max".to_string();
        config.features.enable_device_expert = false;
        config.pipeline.wait_budget_ms = 250;
        config.pipeline.default_location = "Ningbo".to_string();

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.generation.model, "qwen-max");
        assert!(!orchestrator.enable_device_control);
        assert!(orchestrator.enable_expert_consultation);
        assert_eq!(orchestrator.wait_budget, Duration::from_millis(250));
        assert_eq!(orchestrator.history_limit, 20);
        assert_eq!(orchestrator.default_location, "Ningbo");
    }

    #[test]
    fn test_validate_reports_first_bad_section() {
        let mut config = AppConfig::default();
        config.ai.temperature = 3.0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidTemperature));

        let mut config = AppConfig::default();
        config.database = Some(DatabaseConfig::new("redis://nope"));
        assert_eq!(config.validate(), Err(ValidationError::InvalidDatabaseUrl));
    }
}
