//! Configurable capability mocks.
//!
//! Each mock answers from a queue, falls back to a sticky default, records
//! every call and can simulate latency. Used by tests and local runs
//! without external services.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::assistant::{SearchHit, WeatherSnapshot};
use crate::domain::foundation::SessionId;
use crate::ports::{
    CapabilityError, ChunkSink, DeviceController, DeviceResponse, ExpertConsultant, ExpertQuery,
    ExpertResponse, SearchProvider, SearchResponse, WeatherProvider,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared script: queued replies, a sticky default, call log, delay.
#[derive(Debug)]
struct Script<T> {
    queued: Mutex<VecDeque<Result<T, CapabilityError>>>,
    fallback: Mutex<Result<T, CapabilityError>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Result<T, CapabilityError>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    fn push(&self, reply: Result<T, CapabilityError>) {
        lock(&self.queued).push_back(reply);
    }

    fn set_fallback(&self, reply: Result<T, CapabilityError>) {
        *lock(&self.fallback) = reply;
    }

    fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    async fn answer(&self, call: String) -> Result<T, CapabilityError> {
        lock(&self.calls).push(call);
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let queued = lock(&self.queued).pop_front();
        queued.unwrap_or_else(|| lock(&self.fallback).clone())
    }

    fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

macro_rules! mock_common {
    ($name:ident, $reply:ty) => {
        impl $name {
            /// Queues one reply.
            pub fn with_reply(self, reply: Result<$reply, CapabilityError>) -> Self {
                self.script.push(reply);
                self
            }

            /// Reply used once the queue is empty.
            pub fn with_default(self, reply: Result<$reply, CapabilityError>) -> Self {
                self.script.set_fallback(reply);
                self
            }

            pub fn with_delay(self, delay: Duration) -> Self {
                self.script.set_delay(delay);
                self
            }

            pub fn call_count(&self) -> usize {
                self.script.calls().len()
            }

            /// Query text of every call, in order.
            pub fn calls(&self) -> Vec<String> {
                self.script.calls()
            }
        }
    };
}

/// Mock expert service. Answers successfully by default.
#[derive(Debug, Clone)]
pub struct MockExpertConsultant {
    script: Arc<Script<ExpertResponse>>,
}

impl Default for MockExpertConsultant {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExpertConsultant {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script::new(Ok(ExpertResponse::answered("Expert analysis")))),
        }
    }
}

mock_common!(MockExpertConsultant, ExpertResponse);

#[async_trait]
impl ExpertConsultant for MockExpertConsultant {
    async fn consult(&self, query: ExpertQuery) -> Result<ExpertResponse, CapabilityError> {
        self.script.answer(query.query).await
    }
}

/// Mock device service. Acknowledges every command by default.
#[derive(Debug, Clone)]
pub struct MockDeviceController {
    script: Arc<Script<DeviceResponse>>,
    progress: Arc<Mutex<Vec<String>>>,
}

impl Default for MockDeviceController {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeviceController {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script::new(Ok(DeviceResponse::succeeded("Command executed")))),
            progress: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Progress chunks pushed to a sink, when one is supplied.
    pub fn with_progress(self, chunks: &[&str]) -> Self {
        *lock(&self.progress) = chunks.iter().map(|c| c.to_string()).collect();
        self
    }
}

mock_common!(MockDeviceController, DeviceResponse);

#[async_trait]
impl DeviceController for MockDeviceController {
    async fn consult(
        &self,
        query: &str,
        _session_id: &SessionId,
        _context: &BTreeMap<String, String>,
        sink: Option<&dyn ChunkSink>,
    ) -> Result<DeviceResponse, CapabilityError> {
        if let Some(sink) = sink {
            let progress = lock(&self.progress).clone();
            for chunk in progress {
                if sink.send_chunk(&chunk).await.is_err() {
                    break;
                }
            }
        }
        self.script.answer(query.to_string()).await
    }
}

/// Mock weather service. Reports mild weather for any location by default.
#[derive(Debug, Clone)]
pub struct MockWeatherProvider {
    script: Arc<Script<Option<WeatherSnapshot>>>,
}

impl Default for MockWeatherProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWeatherProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script::new(Ok(Some(WeatherSnapshot {
                city: "Shanghai".to_string(),
                temp: 22.0,
                feels_like: 22.5,
                humidity: 70.0,
                weather: "clear sky".to_string(),
                wind_speed: 2.5,
            })))),
        }
    }
}

mock_common!(MockWeatherProvider, Option<WeatherSnapshot>);

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    async fn get_weather(&self, location: &str) -> Result<Option<WeatherSnapshot>, CapabilityError> {
        self.script.answer(location.to_string()).await
    }
}

/// Mock search service. Returns one hit by default.
#[derive(Debug, Clone)]
pub struct MockSearchProvider {
    script: Arc<Script<SearchResponse>>,
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script::new(Ok(SearchResponse::with_results(vec![SearchHit {
                title: "Pond aeration basics".to_string(),
                snippet: "Aerate at night when dissolved oxygen drops.".to_string(),
                url: None,
            }])))),
        }
    }
}

mock_common!(MockSearchProvider, SearchResponse);

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str) -> Result<SearchResponse, CapabilityError> {
        self.script.answer(query.to_string()).await
    }
}
