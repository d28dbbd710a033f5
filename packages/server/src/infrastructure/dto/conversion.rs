//! Conversion logic between DTOs and domain entities.

use lapak_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    MessageContent, MessageId, PendingMessage, RoomId, Timestamp, UserId, ValueObjectError,
};
use crate::infrastructure::dto::websocket::{ClientCommand, ClientFrame, DecodeError, MessagePayload};

pub const MEDIA_TYPE_TEXT: &str = "text";

// ========================================
// DTO → Domain
// ========================================

impl From<ValueObjectError> for DecodeError {
    fn from(err: ValueObjectError) -> Self {
        DecodeError::InvalidField(err.to_string())
    }
}

impl TryFrom<ClientFrame> for ClientCommand {
    type Error = DecodeError;

    fn try_from(frame: ClientFrame) -> Result<Self, Self::Error> {
        let command = match frame {
            ClientFrame::Chat {
                chat_room_id,
                content,
                product,
            } => ClientCommand::SendChat {
                room_id: RoomId::new(chat_room_id)?,
                content: MessageContent::new(content)?,
                product,
            },
            ClientFrame::Read { message_id } => ClientCommand::MarkRead {
                message_id: MessageId::new(message_id)?,
            },
            ClientFrame::JoinRoom { chat_room_id } => ClientCommand::JoinRoom {
                room_id: RoomId::new(chat_room_id)?,
            },
            ClientFrame::LeaveRoom => ClientCommand::LeaveRoom,
        };
        Ok(command)
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<PendingMessage> for MessagePayload {
    fn from(model: PendingMessage) -> Self {
        Self {
            id: model.id.value(),
            chat_room_id: model.room_id.value(),
            sender_id: model.sender_id.value(),
            content: model.content.into_string(),
            media_type: MEDIA_TYPE_TEXT.to_string(),
            product_info: model.product_info,
            is_read: model.is_read,
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl MessagePayload {
    /// Payload for a message delivered straight to a recipient viewing the room.
    ///
    /// It was never stored, so it carries id `0` and is already read.
    pub fn ephemeral(
        room_id: RoomId,
        sender_id: UserId,
        content: &MessageContent,
        product_info: Option<serde_json::Value>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: 0,
            chat_room_id: room_id.value(),
            sender_id: sender_id.value(),
            content: content.as_str().to_string(),
            media_type: MEDIA_TYPE_TEXT.to_string(),
            product_info,
            is_read: true,
            created_at: timestamp_to_rfc3339(created_at.value()),
        }
    }
}
