//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Maximum accepted length of a client-supplied session identifier.
pub const MAX_SESSION_ID_LENGTH: usize = 128;

/// Identifier of a conversation session.
///
/// Sessions are named by the caller (a chat window, a device console, a
/// farm operator's phone), so the id is an opaque non-empty string rather
/// than a server-generated UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId, returning an error if blank or too long.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("session_id"));
        }
        if trimmed.chars().count() > MAX_SESSION_ID_LENGTH {
            return Err(ValidationError::invalid_format(
                "session_id",
                format!("must be at most {} characters", MAX_SESSION_ID_LENGTH),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Unique identifier for a persisted conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(Uuid);

impl TurnId {
    /// Creates a new random TurnId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a TurnId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TurnId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier shared by every frame of one streamed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random MessageId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a MessageId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod session_id {
        use super::*;

        #[test]
        fn accepts_plain_identifier() {
            let id = SessionId::new("pond-3-console").unwrap();
            assert_eq!(id.as_str(), "pond-3-console");
        }

        #[test]
        fn trims_surrounding_whitespace() {
            let id = SessionId::new("  abc  ").unwrap();
            assert_eq!(id.as_str(), "abc");
        }

        #[test]
        fn rejects_blank() {
            assert!(SessionId::new("").is_err());
            assert!(SessionId::new("   ").is_err());
        }

        #[test]
        fn rejects_oversized() {
            let id = "s".repeat(MAX_SESSION_ID_LENGTH + 1);
            assert!(SessionId::new(id).is_err());
        }

        #[test]
        fn accepts_max_length() {
            let id = "s".repeat(MAX_SESSION_ID_LENGTH);
            assert!(SessionId::new(id).is_ok());
        }

        #[test]
        fn deserializes_with_validation() {
            let ok: Result<SessionId, _> = serde_json::from_str("\"abc\"");
            assert!(ok.is_ok());

            let blank: Result<SessionId, _> = serde_json::from_str("\"\"");
            assert!(blank.is_err());
        }

        #[test]
        fn serializes_as_plain_string() {
            let id = SessionId::new("abc").unwrap();
            assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        }
    }

    mod uuid_ids {
        use super::*;

        #[test]
        fn turn_ids_are_unique() {
            assert_ne!(TurnId::new(), TurnId::new());
        }

        #[test]
        fn turn_id_parses_from_display() {
            let id = TurnId::new();
            let parsed: TurnId = id.to_string().parse().unwrap();
            assert_eq!(id, parsed);
        }

        #[test]
        fn message_id_displays_as_uuid() {
            let id = MessageId::new();
            assert_eq!(format!("{}", id).len(), 36);
        }
    }
}
