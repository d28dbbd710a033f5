//! UseCase: 未読メッセージの取り出し（HTTP）
//!
//! 入室時の配信と同じく、返したメッセージはストアから削除される。
//! 既読通知は送らない。

use std::sync::Arc;

use crate::domain::{
    ChatRoomRepository, MessageId, PendingMessage, PendingMessageStore, RoomId, UserId,
};

use super::error::RoomAccessError;

/// 未読メッセージ取り出しのユースケース
pub struct DrainMessagesUseCase {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    pending: Arc<dyn PendingMessageStore>,
}

impl DrainMessagesUseCase {
    pub fn new(
        chat_rooms: Arc<dyn ChatRoomRepository>,
        pending: Arc<dyn PendingMessageStore>,
    ) -> Self {
        Self {
            chat_rooms,
            pending,
        }
    }

    /// 呼び出し元宛ての未読メッセージを古い順に返し、削除する
    pub async fn execute(
        &self,
        caller: UserId,
        room_id: RoomId,
    ) -> Result<Vec<PendingMessage>, RoomAccessError> {
        let room = self.chat_rooms.find_room_with_participants(room_id).await?;
        if !room.has_participant(caller) {
            return Err(RoomAccessError::NotParticipant {
                user_id: caller,
                room_id,
            });
        }

        let messages = self
            .pending
            .unread_for_room(room_id, caller)
            .await
            .map_err(RoomAccessError::Store)?;
        if messages.is_empty() {
            return Ok(messages);
        }

        let ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();
        let deleted = self
            .pending
            .delete_pending_messages(&ids)
            .await
            .map_err(RoomAccessError::Store)?;
        tracing::info!(
            "Drained {} messages from room {} for user {}",
            deleted,
            room_id,
            caller
        );

        Ok(messages)
    }
}
