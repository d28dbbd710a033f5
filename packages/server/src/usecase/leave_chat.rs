//! UseCase: チャットからの退出（HTTP）
//!
//! 呼び出し元を参加者から外し、その人宛ての未読メッセージを破棄する。
//! ルーム自体と相手側の参加は残る。

use std::sync::Arc;

use crate::domain::{ChatRoomRepository, PendingMessageStore, RoomId, UserId};

use super::error::RoomAccessError;

/// チャット退出のユースケース
pub struct LeaveChatUseCase {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    pending: Arc<dyn PendingMessageStore>,
}

impl LeaveChatUseCase {
    pub fn new(
        chat_rooms: Arc<dyn ChatRoomRepository>,
        pending: Arc<dyn PendingMessageStore>,
    ) -> Self {
        Self {
            chat_rooms,
            pending,
        }
    }

    /// 破棄した未読メッセージの件数を返す
    pub async fn execute(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<usize, RoomAccessError> {
        let room = self.chat_rooms.find_room_with_participants(room_id).await?;
        if !room.has_participant(user_id) {
            return Err(RoomAccessError::NotParticipant { user_id, room_id });
        }

        if !self.chat_rooms.remove_participant(room_id, user_id).await? {
            // 並行した退出に先を越された
            return Err(RoomAccessError::NotParticipant { user_id, room_id });
        }
        tracing::info!("User {} left chat room {}", user_id, room_id);

        match self.pending.delete_unread_for_room(room_id, user_id).await {
            Ok(discarded) => Ok(discarded),
            Err(e) => {
                tracing::warn!(
                    "Failed to discard unread messages of room {} for user {}: {}",
                    room_id,
                    user_id,
                    e
                );
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            MessageContent, MockPendingMessageStore, NewPendingMessage, RepositoryError, Timestamp,
        },
        infrastructure::repository::InMemoryChatStore,
    };

    // テスト作業記録
    //
    // 1. 退出すると参加者から外れ、自分宛ての未読は消え、相手宛ては残る
    // 2. 参加者以外・存在しないルームはエラー
    // 3. 未読の破棄に失敗しても退出は成立する

    fn user(id: u64) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn store_message(store: &InMemoryChatStore, room_id: RoomId, sender: UserId, at: i64) {
        store
            .create_pending_message(NewPendingMessage {
                room_id,
                sender_id: sender,
                content: MessageContent::new(format!("from {}", sender)).unwrap(),
                product_info: None,
                created_at: Timestamp::new(at),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_leave_discards_only_own_unread() {
        // テスト項目: 退出で自分宛ての未読だけが破棄され、相手の一覧にはルームが残る
        // given (前提条件):
        let store = Arc::new(InMemoryChatStore::new());
        let (room_id, _) = store
            .find_or_create_private_room(user(1), user(2), Timestamp::new(0))
            .await
            .unwrap();
        store_message(&store, room_id, user(2), 1).await;
        store_message(&store, room_id, user(2), 2).await;
        store_message(&store, room_id, user(1), 3).await;
        let usecase = LeaveChatUseCase::new(store.clone(), store.clone());

        // when (操作):
        let discarded = usecase.execute(user(1), room_id).await.unwrap();

        // then (期待する結果):
        assert_eq!(discarded, 2);
        assert_eq!(store.pending_count().await, 1);
        assert!(store.rooms_for_user(user(1)).await.unwrap().is_empty());
        let remaining = store.rooms_for_user(user(2)).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].other_participant(user(2)), None);

        // 二度目の退出は参加者ではない
        assert_eq!(
            usecase.execute(user(1), room_id).await,
            Err(RoomAccessError::NotParticipant {
                user_id: user(1),
                room_id,
            })
        );
    }

    #[tokio::test]
    async fn test_leave_rejects_outsider_and_unknown_room() {
        // テスト項目: 参加者以外と存在しないルームは退出できない
        // given (前提条件):
        let store = Arc::new(InMemoryChatStore::new());
        let (room_id, _) = store
            .find_or_create_private_room(user(1), user(2), Timestamp::new(0))
            .await
            .unwrap();
        store_message(&store, room_id, user(1), 1).await;
        let usecase = LeaveChatUseCase::new(store.clone(), store.clone());
        let missing = RoomId::new(404).unwrap();

        // when (操作):
        let outsider = usecase.execute(user(7), room_id).await;
        let unknown = usecase.execute(user(1), missing).await;

        // then (期待する結果):
        assert_eq!(
            outsider,
            Err(RoomAccessError::NotParticipant {
                user_id: user(7),
                room_id,
            })
        );
        assert_eq!(unknown, Err(RoomAccessError::RoomNotFound(missing)));
        assert_eq!(store.pending_count().await, 1);
        assert_eq!(store.rooms_for_user(user(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leave_succeeds_when_discard_fails() {
        // テスト項目: 未読の破棄に失敗しても退出は成功し、破棄件数は 0
        // given (前提条件):
        let store = Arc::new(InMemoryChatStore::new());
        let (room_id, _) = store
            .find_or_create_private_room(user(1), user(2), Timestamp::new(0))
            .await
            .unwrap();
        let mut pending = MockPendingMessageStore::new();
        pending
            .expect_delete_unread_for_room()
            .times(1)
            .returning(|_, _| Err(RepositoryError::Storage("down".to_string())));
        let usecase = LeaveChatUseCase::new(store.clone(), Arc::new(pending));

        // when (操作):
        let discarded = usecase.execute(user(1), room_id).await;

        // then (期待する結果):
        assert_eq!(discarded, Ok(0));
        assert!(store.rooms_for_user(user(1)).await.unwrap().is_empty());
    }
}
