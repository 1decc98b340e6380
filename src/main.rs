//! Aqua Sherpa server binary.
//!
//! Loads configuration from the environment, wires the adapters into the
//! request orchestrator and serves the assistant API.

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use http::{HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use aqua_sherpa::adapters::ai::{MockGenerationProvider, OpenAIConfig, OpenAIProvider};
use aqua_sherpa::adapters::capabilities::{
    HttpDeviceController, HttpExpertConsultant, HttpSearchProvider, HttpWeatherProvider,
};
use aqua_sherpa::adapters::history::{InMemoryHistoryLog, PostgresHistoryLog};
use aqua_sherpa::adapters::http::assistant::{assistant_router, AssistantAppState};
use aqua_sherpa::application::{OrchestratorDeps, RequestOrchestrator};
use aqua_sherpa::config::{AppConfig, ServerConfig};
use aqua_sherpa::ports::{GenerationProvider, HistoryLog};

type BoxError = Box<dyn Error + Send + Sync>;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let addr = config.server.socket_addr()?;
    let app = build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Aqua Sherpa listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if server.is_production() {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
    }
}

async fn build_app(config: &AppConfig) -> Result<Router, BoxError> {
    let deps = OrchestratorDeps::new(generation_provider(config)?, history_log(config).await?);
    let deps = attach_capabilities(deps, config)?;

    let orchestrator = Arc::new(RequestOrchestrator::new(deps, config.orchestrator_config()));
    let state = AssistantAppState::new(orchestrator)
        .with_streaming(config.features.enable_streaming)
        .with_verbose_errors(config.features.verbose_errors)
        .with_stream_limits(config.server.ws_outbound_buffer, config.server.ws_max_message_bytes);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let router = assistant_router()
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid));

    Ok(router)
}

fn generation_provider(config: &AppConfig) -> Result<Arc<dyn GenerationProvider>, BoxError> {
    let ai = &config.ai;
    let key = match &ai.api_key {
        Some(key) if ai.has_api_key() => key.expose_secret().clone(),
        _ => {
            tracing::warn!("No AI__API_KEY configured, answering with the offline mock provider");
            return Ok(Arc::new(MockGenerationProvider::new()));
        }
    };

    let mut openai = OpenAIConfig::new(key)
        .with_timeout(ai.timeout())
        .with_max_retries(ai.max_retries);
    if let Some(base_url) = &ai.base_url {
        openai = openai.with_base_url(base_url.clone());
    }
    tracing::info!(model = %ai.model, "Using OpenAI-compatible generation provider");
    Ok(Arc::new(OpenAIProvider::new(openai)?))
}

async fn history_log(config: &AppConfig) -> Result<Arc<dyn HistoryLog>, BoxError> {
    match &config.database {
        Some(database) => {
            let log = PostgresHistoryLog::connect(database).await?;
            tracing::info!("Conversation history stored in PostgreSQL");
            Ok(Arc::new(log))
        }
        None => {
            tracing::warn!("No database configured, conversation history is kept in memory");
            Ok(Arc::new(InMemoryHistoryLog::new()))
        }
    }
}

fn attach_capabilities(mut deps: OrchestratorDeps, config: &AppConfig) -> Result<OrchestratorDeps, BoxError> {
    let services = &config.capabilities;
    let pipeline = &config.pipeline;

    if let Some(expert) = &services.expert {
        deps = deps.with_expert(Arc::new(HttpExpertConsultant::new(expert.endpoint(pipeline.expert_timeout()))?));
    }
    if let Some(device) = &services.device {
        deps = deps.with_device(Arc::new(HttpDeviceController::new(device.endpoint(pipeline.device_timeout()))?));
    }
    if let Some(weather) = &services.weather {
        deps = deps.with_weather(Arc::new(HttpWeatherProvider::new(weather.endpoint(pipeline.weather_timeout()))?));
    }
    if let Some(search) = &services.search {
        deps = deps.with_search(Arc::new(HttpSearchProvider::new(search.endpoint(pipeline.search_timeout()))?));
    }
    Ok(deps)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        if server.is_production() {
            CorsLayer::new()
        } else {
            CorsLayer::permissive()
        }
    } else {
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    }
}
