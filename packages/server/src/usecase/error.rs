//! UseCase layer error types.

use thiserror::Error;

use crate::domain::{MessageId, RepositoryError, RoomId, UserId};

/// Errors from sending a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendChatError {
    #[error("failed to load chat room: {0}")]
    RoomLookup(RepositoryError),

    #[error("user {user_id} is not a participant of chat room {room_id}")]
    NotParticipant { user_id: UserId, room_id: RoomId },

    #[error("failed to store pending message: {0}")]
    Persist(RepositoryError),
}

/// Errors from consuming a read receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadReceiptError {
    #[error("user {user_id} is not a recipient of message {message_id}")]
    NotRecipient {
        user_id: UserId,
        message_id: MessageId,
    },

    #[error("failed to consume pending message: {0}")]
    Store(#[from] RepositoryError),
}

/// Errors from opening a private chat.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitPrivateChatError {
    #[error("cannot open a private chat with yourself")]
    SameUser,

    #[error("failed to open private chat: {0}")]
    Store(RepositoryError),
}

/// Errors from room-scoped queries made on behalf of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomAccessError {
    #[error("chat room {0} not found")]
    RoomNotFound(RoomId),

    #[error("user {user_id} is not a participant of chat room {room_id}")]
    NotParticipant { user_id: UserId, room_id: RoomId },

    #[error("store failure: {0}")]
    Store(RepositoryError),
}

impl From<RepositoryError> for RoomAccessError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::RoomNotFound(room_id) => Self::RoomNotFound(room_id),
            other => Self::Store(other),
        }
    }
}

/// Errors from listing a user's chats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListChatsError {
    #[error("failed to list chats: {0}")]
    Store(#[from] RepositoryError),
}
