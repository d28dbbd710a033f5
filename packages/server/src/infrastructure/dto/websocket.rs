//! WebSocket message DTOs.
//!
//! Every frame is a JSON object with a `type` discriminator. Inbound kinds form a closed
//! set; anything else is rejected at decode time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{MessageContent, MessageId, RoomId};

/// Frames a client may send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Chat {
        chat_room_id: u64,
        content: String,
        /// Snapshot of the listing the conversation is about.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        product: Option<Value>,
    },
    Read {
        message_id: u64,
    },
    JoinRoom {
        chat_room_id: u64,
    },
    LeaveRoom,
}

impl ClientFrame {
    pub const TYPES: [&'static str; 4] = ["chat", "read", "join_room", "leave_room"];
}

/// A decoded and validated client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    SendChat {
        room_id: RoomId,
        content: MessageContent,
        product: Option<Value>,
    },
    MarkRead {
        message_id: MessageId,
    },
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown frame type '{0}'")]
    UnknownType(String),

    #[error("missing frame type")]
    MissingType,

    #[error("invalid field: {0}")]
    InvalidField(String),
}

/// Decode one inbound text frame.
pub fn decode_client_frame(text: &str) -> Result<ClientCommand, DecodeError> {
    let value: Value = serde_json::from_str(text)?;

    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;
    if !ClientFrame::TYPES.contains(&tag) {
        return Err(DecodeError::UnknownType(tag.to_string()));
    }

    let frame: ClientFrame = serde_json::from_value(value)?;
    ClientCommand::try_from(frame)
}

/// Message body carried by `chat` events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    /// `0` for messages that were delivered without being stored.
    pub id: u64,
    pub chat_room_id: u64,
    pub sender_id: u64,
    pub content: String,
    pub media_type: String,
    pub product_info: Option<Value>,
    pub is_read: bool,
    /// RFC 3339 (UTC)
    pub created_at: String,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Chat {
        message: MessagePayload,
        sender_id: u64,
        chat_room_id: u64,
        product: Option<Value>,
    },
    UserStatus {
        user_id: u64,
        is_online: bool,
    },
    RoomStatus {
        user_id: u64,
        chat_room_id: u64,
        in_room: bool,
    },
    OnlineUsersList {
        user_ids: Vec<u64>,
    },
    ReadReceipt {
        message_id: u64,
        chat_room_id: u64,
        read_by: u64,
    },
}

impl ServerEvent {
    pub fn chat(message: MessagePayload, product: Option<Value>) -> Self {
        Self::Chat {
            sender_id: message.sender_id,
            chat_room_id: message.chat_room_id,
            message,
            product,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
