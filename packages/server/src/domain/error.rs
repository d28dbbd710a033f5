//! Domain error types.

use thiserror::Error;

use super::value_object::{MessageId, RoomId};

/// Raised when a value object is constructed from invalid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be zero")]
    ZeroId(&'static str),

    #[error("message content must not be empty")]
    EmptyContent,
}

/// Errors reported by the external chat store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("chat room {0} not found")]
    RoomNotFound(RoomId),

    #[error("pending message {0} not found")]
    MessageNotFound(MessageId),

    #[error("invalid participants: {0}")]
    InvalidParticipants(String),

    #[error("storage failure: {0}")]
    Storage(String),
}
