//! In-memory history log.
//!
//! Used when no database is configured and by every test. Supports fault
//! injection so append retries and history degradation can be exercised.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::domain::assistant::{ConversationTurn, NewTurn, TurnRole};
use crate::domain::foundation::{DomainError, ErrorCode, SessionId, Timestamp, TurnId};
use crate::ports::HistoryLog;

/// Append-only history held in process memory.
///
/// # Example
///
/// ```ignore
/// let log = InMemoryHistoryLog::new();
/// log.append(NewTurn::user(session.clone(), "hello")).await?;
/// assert_eq!(log.count_role(&session, TurnRole::User), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryHistoryLog {
    turns: RwLock<Vec<ConversationTurn>>,
    next_sequence: AtomicU64,
    failing_appends: AtomicUsize,
    failing_queries: AtomicBool,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` appends fail.
    pub fn fail_next_appends(&self, n: usize) {
        self.failing_appends.store(n, Ordering::SeqCst);
    }

    /// Makes every query fail until switched off.
    pub fn fail_queries(&self, failing: bool) {
        self.failing_queries.store(failing, Ordering::SeqCst);
    }

    // === Test Helpers ===

    /// Every turn of a session, oldest first.
    pub fn turns_for(&self, session_id: &SessionId) -> Vec<ConversationTurn> {
        self.turns
            .read()
            .map(|turns| {
                turns
                    .iter()
                    .filter(|t| &t.session_id == session_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count_role(&self, session_id: &SessionId, role: TurnRole) -> usize {
        self.turns_for(session_id)
            .iter()
            .filter(|t| t.role == role)
            .count()
    }

    pub fn len(&self) -> usize {
        self.turns.read().map(|t| t.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn poisoned() -> DomainError {
    DomainError::new(ErrorCode::InternalError, "history lock poisoned")
}

#[async_trait]
impl HistoryLog for InMemoryHistoryLog {
    async fn append(&self, turn: NewTurn) -> Result<TurnId, DomainError> {
        if self.take_injected_failure() {
            return Err(DomainError::database("injected append failure"));
        }

        let id = turn.id;
        let mut turns = self.turns.write().map_err(|_| poisoned())?;
        if turns.iter().any(|t| t.id == id) {
            return Ok(id);
        }
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        turns.push(ConversationTurn::from_new(turn, sequence, Timestamp::now()));
        Ok(id)
    }

    async fn query(&self, session_id: &SessionId, limit: usize) -> Result<Vec<ConversationTurn>, DomainError> {
        if self.failing_queries.load(Ordering::SeqCst) {
            return Err(DomainError::database("injected query failure"));
        }

        let turns = self.turns.read().map_err(|_| poisoned())?;
        let mut selected: Vec<ConversationTurn> = turns
            .iter()
            .rev()
            .filter(|t| &t.session_id == session_id)
            .take(limit)
            .cloned()
            .collect();
        selected.reverse();
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> SessionId {
        SessionId::new(id).unwrap()
    }

    #[tokio::test]
    async fn query_returns_latest_turns_oldest_first() {
        let log = InMemoryHistoryLog::new();
        let s = session("pond-1");
        for i in 0..5 {
            log.append(NewTurn::user(s.clone(), format!("msg {}", i))).await.unwrap();
        }

        let turns = log.query(&s, 3).await.unwrap();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
        assert!(turns.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let log = InMemoryHistoryLog::new();
        log.append(NewTurn::user(session("a"), "for a")).await.unwrap();
        log.append(NewTurn::user(session("b"), "for b")).await.unwrap();

        assert_eq!(log.query(&session("a"), 10).await.unwrap().len(), 1);
        assert!(log.query(&session("unknown"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_append_failures_are_consumed() {
        let log = InMemoryHistoryLog::new();
        log.fail_next_appends(1);

        assert!(log.append(NewTurn::user(session("a"), "x")).await.is_err());
        assert!(log.append(NewTurn::user(session("a"), "x")).await.is_ok());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn appending_the_same_turn_twice_stores_it_once() {
        let log = InMemoryHistoryLog::new();
        let turn = NewTurn::user(session("a"), "feed pond 3 at noon");

        let first = log.append(turn.clone()).await.unwrap();
        let second = log.append(turn).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(log.len(), 1);
        assert_eq!(log.turns_for(&session("a"))[0].sequence, 1);
    }

    #[tokio::test]
    async fn injected_query_failure() {
        let log = InMemoryHistoryLog::new();
        log.fail_queries(true);
        let err = log.query(&session("a"), 10).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[tokio::test]
    async fn concurrent_appends_get_distinct_sequences() {
        let log = std::sync::Arc::new(InMemoryHistoryLog::new());
        let s = session("busy");

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let log = log.clone();
                let s = s.clone();
                tokio::spawn(async move { log.append(NewTurn::user(s, format!("{}", i))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut sequences: Vec<u64> = log.turns_for(&s).iter().map(|t| t.sequence).collect();
        sequences.dedup();
        assert_eq!(sequences.len(), 20);
    }
}
