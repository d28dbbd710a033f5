//! UseCase: チャットメッセージ送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendChatUseCase::execute() メソッド
//! - 直接配信（保存しない）と保留メッセージへの保存の振り分け
//!
//! ### なぜこのテストが必要か
//! - 相手がルームを見ているときは何も保存されないことを保証する
//! - 相手がいないときはちょうど 1 件だけ未読として保存されることを保証する
//! - どちらの場合も送信者にエコーが返り、ルームの最終メッセージが更新されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：相手がルームを閲覧中
//! - 正常系：相手がオンラインだが別画面 / オフライン
//! - エッジケース：相手のいないルーム
//! - 異常系：ルームが存在しない、参加者でない、保存に失敗

use std::sync::Arc;

use lapak_shared::time::Clock;
use serde_json::Value;

use crate::{
    domain::{
        ChatRoomRepository, MessageContent, MessageId, NewPendingMessage, PendingMessageStore,
        RoomId, Timestamp,
    },
    infrastructure::{
        dto::websocket::{MessagePayload, ServerEvent},
        presence::{ConnectionHandle, PresenceRegistry},
    },
};

use super::{error::SendChatError, notify::encode};

/// How a chat message reached its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDelivery {
    /// The recipient was viewing the room. Nothing was stored.
    Direct,
    /// The message was parked in the pending-message store.
    Stored { message_id: MessageId },
}

/// チャットメッセージ送信のユースケース
pub struct SendChatUseCase {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    pending: Arc<dyn PendingMessageStore>,
    registry: PresenceRegistry,
    clock: Arc<dyn Clock>,
}

impl SendChatUseCase {
    pub fn new(
        chat_rooms: Arc<dyn ChatRoomRepository>,
        pending: Arc<dyn PendingMessageStore>,
        registry: PresenceRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chat_rooms,
            pending,
            registry,
            clock,
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `sender` - 送信元の接続（エコーはこの接続にだけ返す）
    /// * `room_id` - 送信先のルーム
    /// * `content` - メッセージ本文
    /// * `product` - 商品スナップショット（任意）
    pub async fn execute(
        &self,
        sender: &ConnectionHandle,
        room_id: RoomId,
        content: MessageContent,
        product: Option<Value>,
    ) -> Result<ChatDelivery, SendChatError> {
        let sender_id = sender.user_id();

        // 1. ルームと参加者を取得
        let room = self
            .chat_rooms
            .find_room_with_participants(room_id)
            .await
            .map_err(SendChatError::RoomLookup)?;
        if !room.has_participant(sender_id) {
            return Err(SendChatError::NotParticipant {
                user_id: sender_id,
                room_id,
            });
        }

        // 2. 相手を特定し、ルームを閲覧中か確認
        let recipient = room.other_participant(sender_id);
        let viewer = recipient.filter(|r| self.registry.is_user_in_room(*r, room_id));
        let now = Timestamp::new(self.clock.now_millis());

        let delivery = match viewer {
            // 3a. 閲覧中: 保存せずに直接配信（既読扱い）
            Some(viewer) => {
                let message = MessagePayload::ephemeral(
                    room_id,
                    sender_id,
                    &content,
                    product.clone(),
                    now,
                );
                if let Some(payload) = encode(&ServerEvent::chat(message, product)) {
                    self.registry.send_to_user(viewer, &payload);
                    self.registry.send_to_connection(sender, payload);
                }
                tracing::debug!(
                    "Message from user {} delivered directly in room {}",
                    sender_id,
                    room_id
                );
                ChatDelivery::Direct
            }
            // 3b. 不在: 未読として保存し、オンラインなら相手にも届ける
            None => {
                let stored = self
                    .pending
                    .create_pending_message(NewPendingMessage {
                        room_id,
                        sender_id,
                        content: content.clone(),
                        product_info: product.clone(),
                        created_at: now,
                    })
                    .await
                    .map_err(SendChatError::Persist)?;
                let message_id = stored.id;

                if let Some(payload) = encode(&ServerEvent::chat(stored.into(), product)) {
                    self.registry.send_to_connection(sender, payload.clone());
                    match recipient {
                        Some(recipient) => {
                            self.registry.send_to_user(recipient, &payload);
                        }
                        None => tracing::warn!(
                            "Chat room {} has no recipient for user {}, message {} stored only",
                            room_id,
                            sender_id,
                            message_id
                        ),
                    }
                }
                tracing::debug!(
                    "Message {} from user {} stored in room {}",
                    message_id,
                    sender_id,
                    room_id
                );
                ChatDelivery::Stored { message_id }
            }
        };

        // 4. チャット一覧用の最終メッセージを更新
        if let Err(e) = self
            .chat_rooms
            .update_room_last_message(room_id, &content, now)
            .await
        {
            tracing::warn!(
                "Failed to update last message of chat room {}: {}",
                room_id,
                e
            );
        }

        Ok(delivery)
    }
}
