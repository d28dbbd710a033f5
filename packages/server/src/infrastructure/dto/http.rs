//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

use super::websocket::MessagePayload;

/// Body of `POST /api/chat/private`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitPrivateChatRequest {
    pub user_id: u64,
    pub target_user_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitPrivateChatResponse {
    pub room_id: u64,
    pub created: bool,
}

/// `?user_id=` query used to identify the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserQuery {
    pub user_id: u64,
}

/// Presence of one participant as seen from the room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantStatusDto {
    pub user_id: u64,
    pub is_online: bool,
    pub in_room: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomStatusDto {
    pub room_id: u64,
    pub participants: Vec<ParticipantStatusDto>,
}

/// Pending messages handed over (and removed) by the mailbox drain endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingMessagesDto {
    pub room_id: u64,
    pub messages: Vec<MessagePayload>,
}

/// One row of `GET /api/chat/rooms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSummaryDto {
    pub id: u64,
    /// `None` once the other participant has left.
    pub other_user_id: Option<u64>,
    pub last_message: Option<String>,
    /// RFC 3339, UTC.
    pub last_message_at: Option<String>,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatListDto {
    pub data: Vec<ChatSummaryDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaveChatResponse {
    pub room_id: u64,
    pub discarded_messages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDto {
    pub error: String,
}

impl ErrorDto {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
