//! Per-request session context.

use std::collections::BTreeMap;

use crate::domain::foundation::SessionId;

use super::ConversationTurn;

/// Default number of turns kept in the recent-history window.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Ephemeral view of a session, rebuilt for every request.
///
/// Holds a bounded, ordered window of the most recent turns plus the
/// caller-supplied auxiliary key/value context (pond id, farm, operator).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    session_id: SessionId,
    recent_history: Vec<ConversationTurn>,
    auxiliary: BTreeMap<String, String>,
    window: usize,
}

impl SessionContext {
    /// Builds a context keeping at most `window` of the given turns.
    ///
    /// Turns are ordered by sequence; when more than `window` are supplied
    /// the oldest are dropped.
    pub fn new(session_id: SessionId, mut history: Vec<ConversationTurn>, window: usize) -> Self {
        history.sort_by_key(|t| t.sequence);
        if history.len() > window {
            history.drain(..history.len() - window);
        }
        Self {
            session_id,
            recent_history: history,
            auxiliary: BTreeMap::new(),
            window,
        }
    }

    /// Attaches auxiliary context.
    pub fn with_auxiliary(mut self, auxiliary: BTreeMap<String, String>) -> Self {
        self.auxiliary = auxiliary;
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn recent_history(&self) -> &[ConversationTurn] {
        &self.recent_history
    }

    /// The last `k` turns of the window (fewer if the window is shorter).
    pub fn last_turns(&self, k: usize) -> &[ConversationTurn] {
        let start = self.recent_history.len().saturating_sub(k);
        &self.recent_history[start..]
    }

    pub fn auxiliary(&self) -> &BTreeMap<String, String> {
        &self.auxiliary
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn is_empty(&self) -> bool {
        self.recent_history.is_empty()
    }

    /// Renders the auxiliary context as `key: value` lines for prompts.
    pub fn auxiliary_lines(&self) -> Option<String> {
        if self.auxiliary.is_empty() {
            return None;
        }
        Some(
            self.auxiliary
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}
