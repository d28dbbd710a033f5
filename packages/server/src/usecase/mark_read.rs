//! UseCase: 既読処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - MarkReadUseCase::execute() メソッド
//!
//! ### なぜこのテストが必要か
//! - 既読になった保留メッセージがストアから消えることを保証する
//! - 送信者に read_receipt が届くことを確認
//! - 宛先でないユーザー（送信者本人・ルーム外のユーザー）がメッセージを消せないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：相手のメッセージを既読にする
//! - エッジケース：存在しない ID
//! - 異常系：自分のメッセージ、ルーム外のユーザー、ストアの障害

use std::sync::Arc;

use crate::{
    domain::{ChatRoomRepository, MessageId, PendingMessage, PendingMessageStore, UserId},
    infrastructure::{dto::websocket::ServerEvent, presence::PresenceRegistry},
};

use super::{error::ReadReceiptError, notify::encode};

/// 既読処理のユースケース
pub struct MarkReadUseCase {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    pending: Arc<dyn PendingMessageStore>,
    registry: PresenceRegistry,
}

impl MarkReadUseCase {
    pub fn new(
        chat_rooms: Arc<dyn ChatRoomRepository>,
        pending: Arc<dyn PendingMessageStore>,
        registry: PresenceRegistry,
    ) -> Self {
        Self {
            chat_rooms,
            pending,
            registry,
        }
    }

    /// 保留メッセージを取り出して削除し、送信者に通知する
    ///
    /// 既読にできるのは、メッセージのルームの参加者のうち送信者以外のユーザーだけ。
    ///
    /// # Returns
    ///
    /// * `Ok(Some(PendingMessage))` - 削除したメッセージ
    /// * `Ok(None)` - すでに存在しない（何もしない）
    /// * `Err(ReadReceiptError::NotRecipient)` - 宛先でない（メッセージは残る）
    /// * `Err(ReadReceiptError::Store)` - ストアの障害
    pub async fn execute(
        &self,
        reader: UserId,
        message_id: MessageId,
    ) -> Result<Option<PendingMessage>, ReadReceiptError> {
        let Some(message) = self.pending.find_pending_message(message_id).await? else {
            tracing::debug!("Pending message {} already consumed", message_id);
            return Ok(None);
        };

        let room = self
            .chat_rooms
            .find_room_with_participants(message.room_id)
            .await?;
        if message.sender_id == reader || !room.has_participant(reader) {
            return Err(ReadReceiptError::NotRecipient {
                user_id: reader,
                message_id,
            });
        }

        let Some(message) = self.pending.pop_pending_message(message_id).await? else {
            tracing::debug!("Pending message {} consumed concurrently", message_id);
            return Ok(None);
        };
        tracing::info!(
            "Pending message {} read by user {}, deleted",
            message_id,
            reader
        );

        let event = ServerEvent::ReadReceipt {
            message_id: message_id.value(),
            chat_room_id: message.room_id.value(),
            read_by: reader.value(),
        };
        if let Some(payload) = encode(&event) {
            self.registry.send_to_user(message.sender_id, &payload);
        }

        Ok(Some(message))
    }
}
