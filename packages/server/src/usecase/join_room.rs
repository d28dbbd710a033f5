//! UseCase: ルーム入室処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinRoomUseCase::execute() メソッド
//! - 入室時の room_status 通知と、未読メッセージの配信・削除
//!
//! ### なぜこのテストが必要か
//! - 別のルームから移動したとき「退室」が「入室」より先に通知されることを保証する
//! - 不在中に溜まったメッセージが届き、ストアから消え、送信者に既読が通知されることを確認
//! - 参加者でないユーザーが他人の未読メッセージを受け取れないことを保証する
//! - 送信キューに積めなかったメッセージは削除されず、次の入室で届くことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：未読がある状態で入室
//! - 正常系：ルーム A からルーム B へ移動
//! - 異常系：参加者でないルーム・存在しないルームへの入室（何も変わらない）
//! - 異常系：配信の途中で送信キューが満杯になる
//! - 異常系：未読の取得に失敗（何も配信しない）

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    domain::{ChatRoomRepository, MessageId, PendingMessageStore, RoomId},
    infrastructure::{
        dto::websocket::ServerEvent,
        presence::{ConnectionHandle, PresenceRegistry},
    },
};

use super::{
    error::RoomAccessError,
    notify::{RoomStatusNotifier, encode},
};

/// ルーム入室のユースケース
pub struct JoinRoomUseCase {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    pending: Arc<dyn PendingMessageStore>,
    registry: PresenceRegistry,
    notifier: Arc<RoomStatusNotifier>,
}

impl JoinRoomUseCase {
    pub fn new(
        chat_rooms: Arc<dyn ChatRoomRepository>,
        pending: Arc<dyn PendingMessageStore>,
        registry: PresenceRegistry,
        notifier: Arc<RoomStatusNotifier>,
    ) -> Self {
        Self {
            chat_rooms,
            pending,
            registry,
            notifier,
        }
    }

    /// 接続のアクティブルームを切り替える
    ///
    /// 未読メッセージの配信はバックグラウンドで行われる。返り値のハンドルは
    /// 配信後に削除された件数を返す。
    ///
    /// # Errors
    ///
    /// ルームが存在しない、または参加者でない場合はアクティブルームを変更せずに
    /// `RoomAccessError` を返す。
    pub async fn execute(
        &self,
        connection: &Arc<ConnectionHandle>,
        room_id: RoomId,
    ) -> Result<JoinHandle<usize>, RoomAccessError> {
        let user_id = connection.user_id();
        let room = self.chat_rooms.find_room_with_participants(room_id).await?;
        if !room.has_participant(user_id) {
            return Err(RoomAccessError::NotParticipant { user_id, room_id });
        }

        let previous = connection.set_active_room(Some(room_id));
        tracing::info!("User {} joined room {}", user_id, room_id);

        if let Some(previous) = previous.filter(|prev| *prev != room_id) {
            self.notifier.notify(previous, user_id, false).await;
        }
        self.notifier.notify_participants(&room, user_id, true);

        Ok(tokio::spawn(flush_pending(
            self.pending.clone(),
            self.registry.clone(),
            connection.clone(),
            room_id,
        )))
    }
}

/// Deliver the reader's unread messages for `room_id`, then delete them.
///
/// Each original sender gets a `read_receipt`. Delivery stops at the first message the
/// connection cannot take; that message and the rest stay in the mailbox.
async fn flush_pending(
    pending: Arc<dyn PendingMessageStore>,
    registry: PresenceRegistry,
    connection: Arc<ConnectionHandle>,
    room_id: RoomId,
) -> usize {
    let reader = connection.user_id();
    let messages = match pending.unread_for_room(room_id, reader).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(
                "Failed to fetch unread messages in room {} for user {}: {}",
                room_id,
                reader,
                e
            );
            return 0;
        }
    };
    if messages.is_empty() {
        return 0;
    }
    let total = messages.len();
    tracing::debug!(
        "Found {} unread messages in room {} for user {}",
        total,
        room_id,
        reader
    );

    let mut delivered: Vec<MessageId> = Vec::with_capacity(total);
    for message in messages {
        let id = message.id;
        let sender_id = message.sender_id;
        let product = message.product_info.clone();

        let Some(payload) = encode(&ServerEvent::chat(message.into(), product)) else {
            continue;
        };
        if !registry.send_to_connection(&connection, payload) {
            tracing::warn!(
                "Stopped flushing room {} for user {} after {} of {} messages",
                room_id,
                reader,
                delivered.len(),
                total
            );
            break;
        }

        let receipt = ServerEvent::ReadReceipt {
            message_id: id.value(),
            chat_room_id: room_id.value(),
            read_by: reader.value(),
        };
        if let Some(payload) = encode(&receipt) {
            registry.send_to_user(sender_id, &payload);
        }
        delivered.push(id);
    }
    if delivered.is_empty() {
        return 0;
    }

    match pending.delete_pending_messages(&delivered).await {
        Ok(deleted) => {
            tracing::info!(
                "Deleted {} messages from room {} after delivery to user {}",
                deleted,
                room_id,
                reader
            );
            deleted
        }
        Err(e) => {
            tracing::warn!(
                "Failed to delete delivered messages in room {}: {}",
                room_id,
                e
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            MessageContent, MockPendingMessageStore, NewPendingMessage, RepositoryError,
            Timestamp, UserId,
        },
        infrastructure::repository::InMemoryChatStore,
    };
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    fn user(id: u64) -> UserId {
        UserId::new(id).unwrap()
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            frames.push(serde_json::from_str(&payload).unwrap());
        }
        frames
    }

    async fn connect(
        registry: &PresenceRegistry,
        user_id: UserId,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<String>) {
        let (handle, mut rx) = ConnectionHandle::new(user_id, 16);
        registry.register(handle.clone()).await.unwrap();
        drain(&mut rx);
        (handle, rx)
    }

    fn usecase(
        store: Arc<InMemoryChatStore>,
        pending: Arc<dyn PendingMessageStore>,
        registry: &PresenceRegistry,
    ) -> JoinRoomUseCase {
        let chat_rooms: Arc<dyn ChatRoomRepository> = store;
        let notifier = Arc::new(RoomStatusNotifier::new(chat_rooms.clone(), registry.clone()));
        JoinRoomUseCase::new(chat_rooms, pending, registry.clone(), notifier)
    }

    #[tokio::test]
    async fn test_join_flushes_pending_messages() {
        // テスト項目: 入室すると未読メッセージが届き、削除され、送信者に既読が届く
        // given (前提条件):
        let store = Arc::new(InMemoryChatStore::new());
        let room_id = store
            .insert_room(vec![user(1), user(2)], Timestamp::new(0))
            .await
            .unwrap();
        for (i, text) in ["first", "second"].into_iter().enumerate() {
            store
                .create_pending_message(NewPendingMessage {
                    room_id,
                    sender_id: user(1),
                    content: MessageContent::new(text.to_string()).unwrap(),
                    product_info: None,
                    created_at: Timestamp::new(i as i64),
                })
                .await
                .unwrap();
        }
        let registry = PresenceRegistry::spawn();
        let (_alice, mut alice_rx) = connect(&registry, user(1)).await;
        let (bob, mut bob_rx) = connect(&registry, user(2)).await;
        drain(&mut alice_rx);
        let usecase = usecase(store.clone(), store.clone(), &registry);

        // when (操作):
        let flushed = usecase.execute(&bob, room_id).await.unwrap().await.unwrap();

        // then (期待する結果):
        assert_eq!(flushed, 2);
        assert_eq!(store.pending_count().await, 0);
        assert_eq!(bob.active_room(), Some(room_id));

        let to_bob = drain(&mut bob_rx);
        let contents: Vec<&Value> = to_bob.iter().map(|f| &f["message"]["content"]).collect();
        assert_eq!(contents, vec![&json!("first"), &json!("second")]);

        let to_alice = drain(&mut alice_rx);
        assert_eq!(to_alice.len(), 3);
        assert_eq!(
            to_alice[0],
            json!({"type": "room_status", "user_id": 2, "chat_room_id": room_id.value(), "in_room": true})
        );
        assert!(to_alice[1..].iter().all(|f| f["type"] == "read_receipt" && f["read_by"] == 2));
    }

    #[tokio::test]
    async fn test_switch_room_reports_left_before_joined() {
        // テスト項目: ルーム A からルーム B へ移動すると「A 退室」が「B 入室」より先に届く
        // given (前提条件):
        let store = Arc::new(InMemoryChatStore::new());
        let room_a = store
            .insert_room(vec![user(1), user(2)], Timestamp::new(0))
            .await
            .unwrap();
        let room_b = store
            .insert_room(vec![user(1), user(2)], Timestamp::new(0))
            .await
            .unwrap();
        let registry = PresenceRegistry::spawn();
        let (_alice, mut alice_rx) = connect(&registry, user(1)).await;
        let (bob, _bob_rx) = connect(&registry, user(2)).await;
        let usecase = usecase(store.clone(), store.clone(), &registry);
        usecase.execute(&bob, room_a).await.unwrap().await.unwrap();
        drain(&mut alice_rx);

        // when (操作):
        usecase.execute(&bob, room_b).await.unwrap().await.unwrap();

        // then (期待する結果):
        let to_alice = drain(&mut alice_rx);
        assert_eq!(
            to_alice,
            vec![
                json!({"type": "room_status", "user_id": 2, "chat_room_id": room_a.value(), "in_room": false}),
                json!({"type": "room_status", "user_id": 2, "chat_room_id": room_b.value(), "in_room": true}),
            ]
        );
        assert!(registry.is_user_in_room(user(2), room_b));
        assert!(!registry.is_user_in_room(user(2), room_a));
    }

    #[tokio::test]
    async fn test_flush_fetch_failure_delivers_nothing() {
        // テスト項目: 未読の取得に失敗した場合は何も配信・削除しない
        // given (前提条件):
        let store = Arc::new(InMemoryChatStore::new());
        let room_id = store
            .insert_room(vec![user(1), user(2)], Timestamp::new(0))
            .await
            .unwrap();
        let mut pending = MockPendingMessageStore::new();
        pending
            .expect_unread_for_room()
            .returning(|_, _| Err(RepositoryError::Storage("offline".to_string())));
        pending.expect_delete_pending_messages().never();
        let registry = PresenceRegistry::spawn();
        let (bob, mut bob_rx) = connect(&registry, user(2)).await;
        let usecase = usecase(store, Arc::new(pending), &registry);

        // when (操作):
        let flushed = usecase.execute(&bob, room_id).await.unwrap().await.unwrap();

        // then (期待する結果):
        assert_eq!(flushed, 0);
        assert!(drain(&mut bob_rx).is_empty());
        assert_eq!(bob.active_room(), Some(room_id));
    }

    async fn room_with_pending(texts: &[&str]) -> (Arc<InMemoryChatStore>, RoomId) {
        let store = Arc::new(InMemoryChatStore::new());
        let room_id = store
            .insert_room(vec![user(1), user(2)], Timestamp::new(0))
            .await
            .unwrap();
        for (i, text) in texts.iter().enumerate() {
            store
                .create_pending_message(NewPendingMessage {
                    room_id,
                    sender_id: user(1),
                    content: MessageContent::new(text.to_string()).unwrap(),
                    product_info: None,
                    created_at: Timestamp::new(i as i64),
                })
                .await
                .unwrap();
        }
        (store, room_id)
    }

    #[tokio::test]
    async fn test_flush_keeps_messages_the_queue_could_not_take() {
        // テスト項目: 送信キューが途中で満杯になった場合、届いた分だけ削除・既読通知され、
        //             残りは次の入室で届く
        // given (前提条件):
        let (store, room_id) = room_with_pending(&["m0", "m1", "m2", "m3", "m4"]).await;
        let registry = PresenceRegistry::spawn();
        let (_alice, mut alice_rx) = connect(&registry, user(1)).await;
        let (bob, mut bob_rx) = ConnectionHandle::new(user(2), 2);
        registry.register(bob.clone()).await.unwrap();
        let usecase = usecase(store.clone(), store.clone(), &registry);

        // when (操作):
        let flushed = usecase.execute(&bob, room_id).await.unwrap().await.unwrap();

        // then (期待する結果):
        assert_eq!(flushed, 2);
        assert_eq!(store.pending_count().await, 3);
        assert!(bob.is_closed());

        let mut contents = Vec::new();
        while let Some(payload) = bob_rx.recv().await {
            let frame: Value = serde_json::from_str(&payload).unwrap();
            contents.push(frame["message"]["content"].clone());
        }
        assert_eq!(contents, vec![json!("m0"), json!("m1")]);

        let receipts = drain(&mut alice_rx)
            .into_iter()
            .filter(|f| f["type"] == "read_receipt")
            .count();
        assert_eq!(receipts, 2);

        // 再接続して入室すると残りが届く
        let (bob_again, mut bob_again_rx) = connect(&registry, user(2)).await;
        let flushed = usecase
            .execute(&bob_again, room_id)
            .await
            .unwrap()
            .await
            .unwrap();
        assert_eq!(flushed, 3);
        assert_eq!(store.pending_count().await, 0);
        let contents: Vec<Value> = drain(&mut bob_again_rx)
            .into_iter()
            .map(|f| f["message"]["content"].clone())
            .collect();
        assert_eq!(contents, vec![json!("m2"), json!("m3"), json!("m4")]);
    }

    #[tokio::test]
    async fn test_non_participant_cannot_join() {
        // テスト項目: 参加者でないユーザーの入室は拒否され、未読メッセージは残る
        // given (前提条件):
        let (store, room_id) = room_with_pending(&["m0", "m1"]).await;
        let registry = PresenceRegistry::spawn();
        let (_alice, mut alice_rx) = connect(&registry, user(1)).await;
        let (outsider, mut outsider_rx) = connect(&registry, user(7)).await;
        drain(&mut alice_rx);
        let usecase = usecase(store.clone(), store.clone(), &registry);

        // when (操作):
        let result = usecase.execute(&outsider, room_id).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(RoomAccessError::NotParticipant { user_id, room_id: r })
                if user_id == user(7) && r == room_id
        ));
        assert_eq!(outsider.active_room(), None);
        assert_eq!(store.pending_count().await, 2);
        assert!(drain(&mut outsider_rx).is_empty());
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_room_is_rejected() {
        // テスト項目: 存在しないルームへの入室は RoomNotFound になり、アクティブルームは変わらない
        // given (前提条件):
        let (store, room_id) = room_with_pending(&[]).await;
        let registry = PresenceRegistry::spawn();
        let (bob, _bob_rx) = connect(&registry, user(2)).await;
        let usecase = usecase(store.clone(), store, &registry);
        usecase.execute(&bob, room_id).await.unwrap().await.unwrap();
        let missing = RoomId::new(99).unwrap();

        // when (操作):
        let result = usecase.execute(&bob, missing).await;

        // then (期待する結果):
        assert!(matches!(result, Err(RoomAccessError::RoomNotFound(r)) if r == missing));
        assert_eq!(bob.active_room(), Some(room_id));
    }
}
