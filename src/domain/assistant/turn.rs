//! Conversation turns - the append-only unit of history.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SessionId, Timestamp, TurnId};

use super::IntentLabel;

/// Free-form metadata attached to a persisted turn.
pub type TurnMetadata = serde_json::Map<String, serde_json::Value>;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    /// Wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(TurnRole::User),
            "assistant" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

/// A turn about to be appended to the history log.
///
/// The id is fixed at construction so a retried append of the same value
/// never produces a second row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub id: TurnId,
    pub session_id: SessionId,
    pub role: TurnRole,
    pub content: String,
    pub intent: Option<IntentLabel>,
    pub metadata: TurnMetadata,
}

impl NewTurn {
    /// Creates a user turn.
    pub fn user(session_id: SessionId, content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            session_id,
            role: TurnRole::User,
            content: content.into(),
            intent: None,
            metadata: TurnMetadata::new(),
        }
    }

    /// Creates an assistant turn.
    pub fn assistant(session_id: SessionId, content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            session_id,
            role: TurnRole::Assistant,
            content: content.into(),
            intent: None,
            metadata: TurnMetadata::new(),
        }
    }

    /// Records the routing intent on the turn.
    pub fn with_intent(mut self, intent: IntentLabel) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Replaces the turn metadata.
    pub fn with_metadata(mut self, metadata: TurnMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A persisted, immutable conversation turn.
///
/// `sequence` is assigned by the history log at append time and is the
/// authoritative ordering within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub sequence: u64,
    pub session_id: SessionId,
    pub role: TurnRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentLabel>,
    #[serde(default)]
    pub metadata: TurnMetadata,
    pub timestamp: Timestamp,
}

impl ConversationTurn {
    /// Materializes an appended turn.
    pub fn from_new(turn: NewTurn, sequence: u64, timestamp: Timestamp) -> Self {
        Self {
            id: turn.id,
            sequence,
            session_id: turn.session_id,
            role: turn.role,
            content: turn.content,
            intent: turn.intent,
            metadata: turn.metadata,
            timestamp,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == TurnRole::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == TurnRole::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::new("s-1").unwrap()
    }

    #[test]
    fn role_roundtrips_through_storage_form() {
        for role in [TurnRole::User, TurnRole::Assistant] {
            assert_eq!(TurnRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(TurnRole::parse("system"), None);
    }

    #[test]
    fn new_turn_builders_set_role() {
        assert_eq!(NewTurn::user(session(), "hi").role, TurnRole::User);
        assert_eq!(NewTurn::assistant(session(), "hello").role, TurnRole::Assistant);
    }

    #[test]
    fn cloned_turn_keeps_its_id() {
        let turn = NewTurn::user(session(), "hi");
        assert_eq!(turn.clone().id, turn.id);
        assert_ne!(NewTurn::user(session(), "hi").id, turn.id);
    }

    #[test]
    fn from_new_preserves_fields() {
        let mut metadata = TurnMetadata::new();
        metadata.insert("source".into(), serde_json::json!("chat"));
        let new = NewTurn::assistant(session(), "answer")
            .with_intent(IntentLabel::Other)
            .with_metadata(metadata.clone());

        let id = new.id;
        let turn = ConversationTurn::from_new(new, 7, Timestamp::now());

        assert_eq!(turn.id, id);
        assert_eq!(turn.sequence, 7);
        assert_eq!(turn.content, "answer");
        assert_eq!(turn.intent, Some(IntentLabel::Other));
        assert_eq!(turn.metadata, metadata);
        assert!(turn.is_assistant());
    }

    #[test]
    fn serializes_role_lowercase_and_skips_missing_intent() {
        let turn = ConversationTurn::from_new(
            NewTurn::user(session(), "hi"),
            1,
            Timestamp::now(),
        );
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains(r#""role":"user""#));
        assert!(!json.contains("intent"));
    }
}
