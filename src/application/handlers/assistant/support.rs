//! Small helpers shared by the pipeline stages.

use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::domain::assistant::{ConversationTurn, TurnRole};
use crate::ports::{GenerationError, GenerationProvider, GenerationRequest, Message};

/// Buffered generation under a hard deadline.
pub(crate) async fn complete_within(
    provider: &dyn GenerationProvider,
    request: GenerationRequest,
    limit: Duration,
) -> Result<String, GenerationError> {
    match timeout(limit, provider.complete(request)).await {
        Ok(result) => result.map(|response| response.content),
        Err(_) => Err(GenerationError::Timeout {
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Converts persisted turns into chat messages.
pub(crate) fn history_messages(turns: &[ConversationTurn]) -> Vec<Message> {
    turns
        .iter()
        .map(|turn| match turn.role {
            TurnRole::User => Message::user(turn.content.clone()),
            TurnRole::Assistant => Message::assistant(turn.content.clone()),
        })
        .collect()
}

/// Plain-text transcript, used where history is embedded in a prompt.
pub(crate) fn transcript(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
