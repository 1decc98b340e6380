//! BackgroundSearch - best-effort lookup running beside the pipeline.
//!
//! Spawned at request entry and joined once, right before integration,
//! under a wait budget shorter than the search's own timeout. The task is
//! aborted on timeout and whenever the handle is dropped, so it never
//! outlives its request.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::domain::assistant::{AbsentReason, SearchOutcome};
use crate::ports::SearchProvider;

pub struct BackgroundSearch {
    handle: Option<JoinHandle<SearchOutcome>>,
}

impl BackgroundSearch {
    /// Starts the search without waiting for it.
    pub fn start(provider: Arc<dyn SearchProvider>, query: impl Into<String>, search_timeout: Duration) -> Self {
        let query = query.into();
        let handle = tokio::spawn(async move {
            match timeout(search_timeout, provider.search(&query)).await {
                Ok(Ok(response)) if response.success && !response.results.is_empty() => {
                    SearchOutcome::Found(response.results)
                }
                Ok(Ok(response)) if response.success => SearchOutcome::Absent(AbsentReason::NoResults),
                Ok(Ok(_)) => {
                    tracing::warn!("Search reported failure");
                    SearchOutcome::Absent(AbsentReason::Failed)
                }
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "Search failed");
                    SearchOutcome::Absent(AbsentReason::Failed)
                }
                Err(_) => SearchOutcome::Absent(AbsentReason::TimedOut),
            }
        });

        Self { handle: Some(handle) }
    }

    /// A search that was never started.
    pub fn disabled() -> Self {
        Self { handle: None }
    }

    /// Waits at most `wait_budget` for the result.
    ///
    /// Timeouts and task failures become explicit `Absent` markers.
    pub async fn join(mut self, wait_budget: Duration) -> SearchOutcome {
        let Some(mut handle) = self.handle.take() else {
            return SearchOutcome::Absent(AbsentReason::Disabled);
        };

        match timeout(wait_budget, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Search task did not complete");
                SearchOutcome::Absent(AbsentReason::Failed)
            }
            Err(_) => {
                handle.abort();
                tracing::info!(
                    wait_budget_ms = wait_budget.as_millis() as u64,
                    "Search exceeded wait budget, continuing without it"
                );
                SearchOutcome::Absent(AbsentReason::TimedOut)
            }
        }
    }
}

impl Drop for BackgroundSearch {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::capabilities::MockSearchProvider;
    use crate::ports::{CapabilityError, SearchResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    fn start(provider: &MockSearchProvider, search_timeout: Duration) -> BackgroundSearch {
        BackgroundSearch::start(Arc::new(provider.clone()), "dissolved oxygen", search_timeout)
    }

    #[tokio::test]
    async fn returns_hits_when_fast() {
        let provider = MockSearchProvider::new();
        let outcome = start(&provider, Duration::from_secs(1)).join(Duration::from_secs(1)).await;

        assert!(outcome.is_found());
        assert_eq!(provider.calls(), vec!["dissolved oxygen"]);
    }

    #[tokio::test]
    async fn wait_budget_bounds_the_join() {
        let provider = MockSearchProvider::new().with_delay(Duration::from_secs(5));

        let started = Instant::now();
        let outcome = start(&provider, Duration::from_secs(10)).join(Duration::from_millis(50)).await;

        assert_eq!(outcome, SearchOutcome::Absent(AbsentReason::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn own_timeout_is_independent_of_wait_budget() {
        let provider = MockSearchProvider::new().with_delay(Duration::from_millis(200));
        let outcome = start(&provider, Duration::from_millis(20)).join(Duration::from_secs(2)).await;

        assert_eq!(outcome, SearchOutcome::Absent(AbsentReason::TimedOut));
    }

    #[tokio::test]
    async fn failures_become_absent() {
        let provider = MockSearchProvider::new()
            .with_reply(Err(CapabilityError::unavailable("search")))
            .with_reply(Ok(SearchResponse::default()))
            .with_reply(Ok(SearchResponse::with_results(vec![])));

        let first = start(&provider, Duration::from_secs(1)).join(Duration::from_secs(1)).await;
        let second = start(&provider, Duration::from_secs(1)).join(Duration::from_secs(1)).await;
        let third = start(&provider, Duration::from_secs(1)).join(Duration::from_secs(1)).await;

        assert_eq!(first, SearchOutcome::Absent(AbsentReason::Failed));
        assert_eq!(second, SearchOutcome::Absent(AbsentReason::Failed));
        assert_eq!(third, SearchOutcome::Absent(AbsentReason::NoResults));
    }

    #[tokio::test]
    async fn disabled_search_is_absent() {
        let outcome = BackgroundSearch::disabled().join(Duration::from_secs(1)).await;
        assert_eq!(outcome, SearchOutcome::Absent(AbsentReason::Disabled));
    }

    struct SlowSearch {
        completed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SearchProvider for SlowSearch {
        async fn search(&self, _query: &str) -> Result<SearchResponse, CapabilityError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.completed.store(true, Ordering::SeqCst);
            Ok(SearchResponse::default())
        }
    }

    #[tokio::test]
    async fn dropping_the_handle_aborts_the_task() {
        let completed = Arc::new(AtomicBool::new(false));
        let search = BackgroundSearch::start(
            Arc::new(SlowSearch { completed: completed.clone() }),
            "q",
            Duration::from_secs(1),
        );

        drop(search);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn timed_out_join_aborts_the_task() {
        let completed = Arc::new(AtomicBool::new(false));
        let search = BackgroundSearch::start(
            Arc::new(SlowSearch { completed: completed.clone() }),
            "q",
            Duration::from_secs(1),
        );

        let outcome = search.join(Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(outcome, SearchOutcome::Absent(AbsentReason::TimedOut));
        assert!(!completed.load(Ordering::SeqCst));
    }
}
