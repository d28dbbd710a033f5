//! UseCase: チャット一覧の取得（HTTP）
//!
//! 最終メッセージの新しい順に並べ、相手ユーザーと未読件数を添える。
//! 未読件数はメールボックスに残っている相手からのメッセージ数。

use std::{cmp::Reverse, sync::Arc};

use crate::domain::{ChatRoomRepository, PendingMessageStore, RoomId, Timestamp, UserId};

use super::error::ListChatsError;

/// 一覧の1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub room_id: RoomId,
    /// 相手が退出済みのルームでは `None`
    pub other_user_id: Option<UserId>,
    pub last_message: Option<String>,
    pub last_message_at: Option<Timestamp>,
    pub unread_count: usize,
}

/// チャット一覧取得のユースケース
pub struct ListChatsUseCase {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    pending: Arc<dyn PendingMessageStore>,
}

impl ListChatsUseCase {
    pub fn new(
        chat_rooms: Arc<dyn ChatRoomRepository>,
        pending: Arc<dyn PendingMessageStore>,
    ) -> Self {
        Self {
            chat_rooms,
            pending,
        }
    }

    /// メッセージのないルームは末尾、同順位は新しいルームが先
    pub async fn execute(&self, user_id: UserId) -> Result<Vec<ChatSummary>, ListChatsError> {
        let rooms = self.chat_rooms.rooms_for_user(user_id).await?;

        let mut chats = Vec::with_capacity(rooms.len());
        for room in rooms {
            let unread_count = self.pending.count_unread_for_room(room.id, user_id).await?;
            chats.push(ChatSummary {
                room_id: room.id,
                other_user_id: room.other_participant(user_id),
                last_message: room.last_message_content,
                last_message_at: room.last_message_at,
                unread_count,
            });
        }

        chats.sort_by_key(|chat| Reverse((chat.last_message_at, chat.room_id)));
        Ok(chats)
    }
}
