//! History log port - the append-only conversation record.
//!
//! The only resource shared across requests. Appends and queries are
//! independent of each other and safe to retry.

use async_trait::async_trait;

use crate::domain::assistant::{ConversationTurn, NewTurn};
use crate::domain::foundation::{DomainError, SessionId, TurnId};

/// Repository port for conversation turns.
///
/// Implementations must:
/// - never mutate or delete an appended turn
/// - assign each turn a sequence number greater than every earlier turn
///   of the same log, so concurrent appends never overwrite each other
/// - treat a second append of an id already stored as a successful no-op
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Append one turn and return its identifier.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn append(&self, turn: NewTurn) -> Result<TurnId, DomainError>;

    /// Most recent `limit` turns of a session, oldest first.
    ///
    /// Unknown sessions yield an empty list.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn query(&self, session_id: &SessionId, limit: usize) -> Result<Vec<ConversationTurn>, DomainError>;
}
