//! Branch handlers - the three mutually exclusive processing strategies.
//!
//! Handlers never return errors. Each produces a `BranchOutcome` and the
//! orchestrator resolves failures through the fallback table:
//! device failures are surfaced, expert failures fall through to casual
//! chat, and a chat failure ends the pipeline.

mod casual_chat;
mod device_control;
mod expert_consultation;

use async_trait::async_trait;

use crate::domain::assistant::{BranchKind, BranchOutcome, ConversationTurn, SessionContext};
use crate::domain::foundation::SessionId;

pub use casual_chat::CasualChatBranch;
pub use device_control::DeviceControlBranch;
pub use expert_consultation::ExpertConsultationBranch;

/// Extra key holding the query an expert branch actually sent.
pub const REWRITTEN_QUERY_KEY: &str = "rewritten_query";

/// Inputs shared by every branch.
#[derive(Debug, Clone, Copy)]
pub struct BranchInput<'a> {
    pub text: &'a str,
    pub session_id: &'a SessionId,
    pub context: &'a SessionContext,
    pub history: &'a [ConversationTurn],
}

impl<'a> BranchInput<'a> {
    pub fn new(text: &'a str, context: &'a SessionContext) -> Self {
        Self {
            text,
            session_id: context.session_id(),
            context,
            history: context.recent_history(),
        }
    }

    /// Same input with a different query text.
    pub fn with_text(self, text: &'a str) -> Self {
        Self { text, ..self }
    }
}

#[async_trait]
pub trait BranchHandler: Send + Sync {
    fn kind(&self) -> BranchKind;

    async fn handle(&self, input: BranchInput<'_>) -> BranchOutcome;
}
