//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, the timestamp value object and error types
//! that form the vocabulary of the assistant domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{MessageId, SessionId, TurnId, MAX_SESSION_ID_LENGTH};
pub use timestamp::Timestamp;
