//! CasualChat branch - the terminal state of every fallback chain.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::application::handlers::assistant::prompts::CHAT_PERSONA;
use crate::application::handlers::assistant::support::{complete_within, history_messages};
use crate::domain::assistant::{BranchFailure, BranchKind, BranchOutcome, BranchResult, BranchSource, FailureReason};
use crate::ports::{
    purpose, GenerationError, GenerationProvider, GenerationRequest, GenerationSettings, MessageRole,
    RequestMetadata,
};

use super::{BranchHandler, BranchInput};

pub struct CasualChatBranch {
    provider: Arc<dyn GenerationProvider>,
    settings: GenerationSettings,
    timeout: Duration,
}

impl CasualChatBranch {
    pub fn new(provider: Arc<dyn GenerationProvider>, settings: GenerationSettings, timeout: Duration) -> Self {
        Self {
            provider,
            settings,
            timeout,
        }
    }
}

#[async_trait]
impl BranchHandler for CasualChatBranch {
    fn kind(&self) -> BranchKind {
        BranchKind::CasualChat
    }

    async fn handle(&self, input: BranchInput<'_>) -> BranchOutcome {
        let mut system = CHAT_PERSONA.to_string();
        if let Some(auxiliary) = input.context.auxiliary_lines() {
            system.push_str(&format!("\n\nFarm context:\n{}", auxiliary));
        }

        let request = GenerationRequest::new(
            self.settings.clone(),
            RequestMetadata::new(purpose::CHAT).with_session(input.session_id.clone()),
        )
        .with_system_prompt(system)
        .with_messages(history_messages(input.history))
        .with_message(MessageRole::User, input.text);

        match complete_within(self.provider.as_ref(), request, self.timeout).await {
            Ok(draft) if !draft.trim().is_empty() => {
                BranchOutcome::Ok(BranchResult::new(draft, BranchSource::Chat, true))
            }
            Ok(_) => BranchOutcome::Fail(BranchFailure::new(
                self.kind(),
                FailureReason::Unsuccessful,
                "empty chat response",
            )),
            Err(err) => {
                tracing::error!(session_id = %input.session_id, error = %err, "Casual chat generation failed");
                let reason = match err {
                    GenerationError::Timeout { .. } => FailureReason::TimedOut,
                    _ => FailureReason::Errored,
                };
                BranchOutcome::Fail(BranchFailure::new(self.kind(), reason, err.to_string()))
            }
        }
    }
}
