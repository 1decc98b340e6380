//! QueryRewriter - expands a follow-up into a self-contained query.
//!
//! Best effort only: empty, too-short or failed rewrites fall back to the
//! original text.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::assistant::{ConversationTurn, SessionContext};
use crate::ports::{purpose, GenerationProvider, GenerationRequest, GenerationSettings, MessageRole, RequestMetadata};

use super::prompts::REWRITE_SYSTEM;
use super::support::{complete_within, elapsed_ms, transcript};

/// Rewrites shorter than this many characters are discarded.
const MIN_REWRITE_CHARS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewriteStats {
    pub elapsed_ms: u64,
    /// True when the returned text differs from the input.
    pub rewritten: bool,
    pub error: Option<String>,
}

pub struct QueryRewriter {
    provider: Arc<dyn GenerationProvider>,
    settings: GenerationSettings,
    window: usize,
    timeout: Duration,
}

impl QueryRewriter {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        settings: &GenerationSettings,
        window: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            settings: GenerationSettings {
                temperature: 0.3,
                max_tokens: 256,
                enable_search: false,
                ..settings.clone()
            },
            window,
            timeout,
        }
    }

    pub async fn rewrite(
        &self,
        text: &str,
        history: &[ConversationTurn],
        context: &SessionContext,
    ) -> (String, RewriteStats) {
        let started = Instant::now();
        let mut stats = RewriteStats::default();

        let recent = &history[history.len().saturating_sub(self.window)..];
        let mut prompt = String::new();
        if !recent.is_empty() {
            prompt.push_str(&format!("Conversation:\n{}\n\n", transcript(recent)));
        }
        if let Some(auxiliary) = context.auxiliary_lines() {
            prompt.push_str(&format!("Farm context:\n{}\n\n", auxiliary));
        }
        prompt.push_str(&format!("Latest question: {}", text));

        let request = GenerationRequest::new(
            self.settings.clone(),
            RequestMetadata::new(purpose::REWRITE).with_session(context.session_id().clone()),
        )
        .with_system_prompt(REWRITE_SYSTEM)
        .with_message(MessageRole::User, prompt);

        let result = match complete_within(self.provider.as_ref(), request, self.timeout).await {
            Ok(raw) => {
                let candidate = raw.trim();
                if candidate.chars().count() < MIN_REWRITE_CHARS {
                    tracing::debug!(rewrite = %candidate, "Rewrite too short, keeping original query");
                    text.to_string()
                } else {
                    candidate.to_string()
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Query rewrite failed, keeping original query");
                stats.error = Some(err.to_string());
                text.to_string()
            }
        };

        stats.rewritten = result != text;
        stats.elapsed_ms = elapsed_ms(started);
        (result, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockError, MockGenerationProvider};
    use crate::domain::assistant::NewTurn;
    use crate::domain::foundation::{SessionId, Timestamp};

    fn session() -> SessionId {
        SessionId::new("pond-farm").unwrap()
    }

    fn turns(n: usize) -> Vec<ConversationTurn> {
        (0..n)
            .map(|i| {
                ConversationTurn::from_new(
                    NewTurn::user(session(), format!("turn {}", i)),
                    i as u64 + 1,
                    Timestamp::now(),
                )
            })
            .collect()
    }

    fn rewriter(provider: &MockGenerationProvider, window: usize) -> QueryRewriter {
        QueryRewriter::new(
            Arc::new(provider.clone()),
            &GenerationSettings::default(),
            window,
            Duration::from_secs(1),
        )
    }

    fn context() -> SessionContext {
        SessionContext::new(session(), vec![], 20)
    }

    #[tokio::test]
    async fn returns_the_expanded_query() {
        let provider = MockGenerationProvider::new()
            .with_purpose_response(purpose::REWRITE, "  Dissolved oxygen trend in pond 3 over the last 7 days\n");
        let (query, stats) = rewriter(&provider, 6).rewrite("and last week?", &[], &context()).await;

        assert_eq!(query, "Dissolved oxygen trend in pond 3 over the last 7 days");
        assert!(stats.rewritten);
    }

    #[tokio::test]
    async fn empty_or_short_rewrites_keep_the_original() {
        for reply in ["", "   ", "x"] {
            let provider = MockGenerationProvider::new().with_purpose_response(purpose::REWRITE, reply);
            let (query, stats) = rewriter(&provider, 6).rewrite("DO trend?", &[], &context()).await;
            assert_eq!(query, "DO trend?");
            assert!(!stats.rewritten);
        }
    }

    #[tokio::test]
    async fn failure_keeps_the_original() {
        let provider = MockGenerationProvider::new().failing(MockError::Network { message: "reset".into() });
        let (query, stats) = rewriter(&provider, 6).rewrite("DO trend?", &[], &context()).await;

        assert_eq!(query, "DO trend?");
        assert!(stats.error.is_some());
    }

    #[tokio::test]
    async fn only_the_last_window_turns_are_sent() {
        let provider = MockGenerationProvider::new().with_purpose_response(purpose::REWRITE, "expanded");
        rewriter(&provider, 2).rewrite("q", &turns(5), &context()).await;

        let prompt = provider.get_calls()[0].last_user_message().unwrap().to_string();
        assert!(prompt.contains("turn 3"));
        assert!(prompt.contains("turn 4"));
        assert!(!prompt.contains("turn 2"));
    }
}
