//! Generation Provider Adapters.
//!
//! - `MockGenerationProvider` - Configurable mock for testing
//! - `OpenAIProvider` - Any OpenAI-compatible chat completions endpoint

mod mock_provider;
mod openai_provider;

pub use mock_provider::{split_chunks, MockError, MockGenerationProvider, MockResponse};
pub use openai_provider::{OpenAIConfig, OpenAIProvider, DEFAULT_BASE_URL};
