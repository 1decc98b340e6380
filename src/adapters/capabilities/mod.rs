//! Capability adapters: reqwest clients for the expert, device, weather
//! and search services, plus configurable mocks of each.

mod device_client;
mod expert_client;
mod http;
mod mock;
mod search_client;
mod weather_client;

pub use device_client::HttpDeviceController;
pub use expert_client::HttpExpertConsultant;
pub use http::ServiceEndpoint;
pub use mock::{MockDeviceController, MockExpertConsultant, MockSearchProvider, MockWeatherProvider};
pub use search_client::HttpSearchProvider;
pub use weather_client::HttpWeatherProvider;
