//! ExpertConsultation branch.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::application::handlers::assistant::QueryRewriter;
use crate::domain::assistant::{BranchFailure, BranchKind, BranchOutcome, BranchResult, BranchSource, FailureReason};
use crate::ports::{ExpertConsultant, ExpertQuery, GenerationSettings};

use super::{BranchHandler, BranchInput, REWRITTEN_QUERY_KEY};

/// Answers data and water-quality questions through the expert service.
///
/// The query is rewritten first. Every failure carries the rewritten
/// query so casual chat can take over with it.
pub struct ExpertConsultationBranch {
    consultant: Option<Arc<dyn ExpertConsultant>>,
    rewriter: QueryRewriter,
    settings: GenerationSettings,
    enabled: bool,
    timeout: Duration,
}

impl ExpertConsultationBranch {
    pub fn new(
        consultant: Option<Arc<dyn ExpertConsultant>>,
        rewriter: QueryRewriter,
        settings: GenerationSettings,
        enabled: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            consultant,
            rewriter,
            settings,
            enabled,
            timeout,
        }
    }

    fn fail(&self, reason: FailureReason, detail: impl Into<String>, query: &str) -> BranchOutcome {
        BranchOutcome::Fail(BranchFailure::new(self.kind(), reason, detail).with_fallback_query(query))
    }
}

#[async_trait]
impl BranchHandler for ExpertConsultationBranch {
    fn kind(&self) -> BranchKind {
        BranchKind::ExpertConsultation
    }

    async fn handle(&self, input: BranchInput<'_>) -> BranchOutcome {
        let (query, rewrite) = self.rewriter.rewrite(input.text, input.history, input.context).await;
        tracing::debug!(
            session_id = %input.session_id,
            rewritten = rewrite.rewritten,
            elapsed_ms = rewrite.elapsed_ms,
            "Expert query prepared"
        );

        let consultant = match &self.consultant {
            Some(consultant) if self.enabled => consultant,
            _ => return self.fail(FailureReason::Disabled, "expert consultation disabled", &query),
        };

        let request = ExpertQuery {
            query: query.clone(),
            context: input.context.auxiliary().clone(),
            session_id: input.session_id.clone(),
            settings: self.settings.clone(),
        };

        match timeout(self.timeout, consultant.consult(request)).await {
            Ok(Ok(response)) if response.success && !response.answer.trim().is_empty() => {
                let mut result = BranchResult::new(response.answer, BranchSource::Expert, true)
                    .with_extra(REWRITTEN_QUERY_KEY, query)
                    .with_extra("sources", response.sources);
                if let Some(confidence) = response.confidence {
                    result = result.with_extra("confidence", confidence);
                }
                BranchOutcome::Ok(result)
            }
            Ok(Ok(response)) => {
                let detail = response.error.unwrap_or_else(|| "expert returned no answer".to_string());
                tracing::warn!(session_id = %input.session_id, detail = %detail, "Expert unsuccessful, falling back");
                self.fail(FailureReason::Unsuccessful, detail, &query)
            }
            Ok(Err(err)) => {
                tracing::warn!(session_id = %input.session_id, error = %err, "Expert service error, falling back");
                self.fail(FailureReason::Errored, err.to_string(), &query)
            }
            Err(_) => {
                tracing::warn!(session_id = %input.session_id, "Expert service timed out, falling back");
                self.fail(
                    FailureReason::TimedOut,
                    format!("no response within {}ms", self.timeout.as_millis()),
                    &query,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockGenerationProvider;
    use crate::adapters::capabilities::MockExpertConsultant;
    use crate::domain::assistant::SessionContext;
    use crate::domain::foundation::SessionId;
    use crate::ports::{purpose, CapabilityError, ExpertResponse};

    const REWRITTEN: &str = "Dissolved oxygen trend for all ponds over the previous 7 days";

    fn context() -> SessionContext {
        SessionContext::new(SessionId::new("farm-1").unwrap(), vec![], 20)
    }

    fn branch(expert: Option<&MockExpertConsultant>, enabled: bool) -> ExpertConsultationBranch {
        let generation = MockGenerationProvider::new().with_purpose_response(purpose::REWRITE, REWRITTEN);
        let rewriter = QueryRewriter::new(
            Arc::new(generation),
            &GenerationSettings::default(),
            6,
            Duration::from_secs(1),
        );
        ExpertConsultationBranch::new(
            expert.map(|e| Arc::new(e.clone()) as Arc<dyn ExpertConsultant>),
            rewriter,
            GenerationSettings::default(),
            enabled,
            Duration::from_millis(100),
        )
    }

    fn assert_falls_back(outcome: BranchOutcome, reason: FailureReason) {
        match outcome {
            BranchOutcome::Fail(failure) => {
                assert_eq!(failure.reason, reason);
                assert_eq!(failure.fallback_query.as_deref(), Some(REWRITTEN));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn sends_the_rewritten_query() {
        let expert = MockExpertConsultant::new().with_reply(Ok(ExpertResponse {
            success: true,
            answer: "DO averaged 5.8 mg/L, dipping to 4.1 before dawn.".into(),
            confidence: Some(0.82),
            sources: vec!["sensor-log".into()],
            error: None,
        }));
        let ctx = context();

        let outcome = branch(Some(&expert), true)
            .handle(BranchInput::new("What was the dissolved-oxygen trend last week?", &ctx))
            .await;

        let result = outcome.result().cloned().unwrap();
        assert_eq!(result.source, BranchSource::Expert);
        assert_eq!(result.extra[REWRITTEN_QUERY_KEY], REWRITTEN);
        assert_eq!(result.extra["confidence"], 0.82);
        assert_eq!(expert.calls(), vec![REWRITTEN]);
    }

    #[tokio::test]
    async fn disabled_falls_back_without_calls() {
        let expert = MockExpertConsultant::new();
        let ctx = context();

        assert_falls_back(
            branch(Some(&expert), false).handle(BranchInput::new("DO trend?", &ctx)).await,
            FailureReason::Disabled,
        );
        assert_falls_back(
            branch(None, true).handle(BranchInput::new("DO trend?", &ctx)).await,
            FailureReason::Disabled,
        );
        assert_eq!(expert.call_count(), 0);
    }

    #[tokio::test]
    async fn unsuccessful_answer_falls_back() {
        let expert = MockExpertConsultant::new().with_reply(Ok(ExpertResponse::failed("no sensor data")));
        let ctx = context();
        assert_falls_back(
            branch(Some(&expert), true).handle(BranchInput::new("DO trend?", &ctx)).await,
            FailureReason::Unsuccessful,
        );
    }

    #[tokio::test]
    async fn blank_answer_counts_as_unsuccessful() {
        let expert = MockExpertConsultant::new().with_reply(Ok(ExpertResponse::answered("  ")));
        let ctx = context();
        assert_falls_back(
            branch(Some(&expert), true).handle(BranchInput::new("DO trend?", &ctx)).await,
            FailureReason::Unsuccessful,
        );
    }

    #[tokio::test]
    async fn errors_and_timeouts_fall_back() {
        let ctx = context();
        let erroring = MockExpertConsultant::new().with_reply(Err(CapabilityError::unavailable("expert")));
        assert_falls_back(
            branch(Some(&erroring), true).handle(BranchInput::new("DO trend?", &ctx)).await,
            FailureReason::Errored,
        );

        let slow = MockExpertConsultant::new().with_delay(Duration::from_millis(500));
        assert_falls_back(
            branch(Some(&slow), true).handle(BranchInput::new("DO trend?", &ctx)).await,
            FailureReason::TimedOut,
        );
    }

    #[tokio::test]
    async fn timeout_detail_uses_millis() {
        let ctx = context();
        let slow = MockExpertConsultant::new().with_delay(Duration::from_millis(500));
        match branch(Some(&slow), true).handle(BranchInput::new("DO trend?", &ctx)).await {
            BranchOutcome::Fail(failure) => assert_eq!(failure.detail, "no response within 100ms"),
            other => panic!("expected fallback, got {:?}", other),
        }
    }
}
