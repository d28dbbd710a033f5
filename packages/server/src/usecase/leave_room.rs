//! UseCase: ルーム退室処理

use std::sync::Arc;

use crate::{domain::RoomId, infrastructure::presence::ConnectionHandle};

use super::notify::RoomStatusNotifier;

/// ルーム退室のユースケース
pub struct LeaveRoomUseCase {
    notifier: Arc<RoomStatusNotifier>,
}

impl LeaveRoomUseCase {
    pub fn new(notifier: Arc<RoomStatusNotifier>) -> Self {
        Self { notifier }
    }

    /// アクティブルームを解除し、直前のルームの参加者に退室を通知する
    ///
    /// 直前のルームを返す。どのルームも見ていなければ何もしない。
    pub async fn execute(&self, connection: &ConnectionHandle) -> Option<RoomId> {
        let user_id = connection.user_id();
        let previous = connection.set_active_room(None)?;
        tracing::info!("User {} left room {}", user_id, previous);

        self.notifier.notify(previous, user_id, false).await;
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Timestamp, UserId},
        infrastructure::{presence::PresenceRegistry, repository::InMemoryChatStore},
    };
    use serde_json::{Value, json};

    fn user(id: u64) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_leave_notifies_previous_room() {
        // テスト項目: 退室すると直前のルームの相手に退室が通知される
        // given (前提条件):
        let store = Arc::new(InMemoryChatStore::new());
        let room_id = store
            .insert_room(vec![user(1), user(2)], Timestamp::new(0))
            .await
            .unwrap();
        let registry = PresenceRegistry::spawn();
        let (alice, mut alice_rx) = ConnectionHandle::new(user(1), 8);
        let (bob, _bob_rx) = ConnectionHandle::new(user(2), 8);
        registry.register(bob.clone()).await.unwrap();
        registry.register(alice).await.unwrap();
        bob.set_active_room(Some(room_id));
        let usecase = LeaveRoomUseCase::new(Arc::new(RoomStatusNotifier::new(
            store,
            registry.clone(),
        )));

        // when (操作):
        let left = usecase.execute(&bob).await;

        // then (期待する結果):
        assert_eq!(left, Some(room_id));
        assert_eq!(bob.active_room(), None);
        assert!(!registry.is_user_in_room(user(2), room_id));
        let payload: Value = serde_json::from_str(&alice_rx.try_recv().unwrap()).unwrap();
        assert_eq!(
            payload,
            json!({"type": "room_status", "user_id": 2, "chat_room_id": room_id.value(), "in_room": false})
        );
    }

    #[tokio::test]
    async fn test_leave_without_active_room_is_noop() {
        // テスト項目: どのルームも見ていない状態での退室は何もしない
        // given (前提条件):
        let store = Arc::new(InMemoryChatStore::new());
        let registry = PresenceRegistry::spawn();
        let (bob, _bob_rx) = ConnectionHandle::new(user(2), 8);
        let usecase = LeaveRoomUseCase::new(Arc::new(RoomStatusNotifier::new(store, registry)));

        // when (操作):
        let left = usecase.execute(&bob).await;

        // then (期待する結果):
        assert_eq!(left, None);
    }
}
