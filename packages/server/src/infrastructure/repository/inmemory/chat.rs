//! InMemory chat store 実装
//!
//! ドメイン層が定義する `ChatRoomRepository` と `PendingMessageStore` の具体的な実装。
//! HashMap / BTreeMap をインメモリ DB として使用します。
//!
//! 1 つのロックの中で読み書きするため、ルーム作成と参加者追加は常に 1 トランザクションとして
//! 扱われます（途中で失敗した場合は何も書き込まれません）。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChatRoom, ChatRoomRepository, MessageContent, MessageId, NewPendingMessage, Participant,
    PendingMessage, PendingMessageStore, RepositoryError, RoomId, Timestamp, UserId,
};

#[derive(Default)]
struct StoreState {
    rooms: HashMap<RoomId, ChatRoom>,
    /// Keyed by id; ids are allocated in insertion order.
    messages: BTreeMap<MessageId, PendingMessage>,
    last_room_id: u64,
    last_message_id: u64,
}

impl StoreState {
    fn allocate_room_id(&mut self) -> Result<RoomId, RepositoryError> {
        self.last_room_id += 1;
        RoomId::new(self.last_room_id).map_err(|e| RepositoryError::Storage(e.to_string()))
    }

    fn allocate_message_id(&mut self) -> Result<MessageId, RepositoryError> {
        self.last_message_id += 1;
        MessageId::new(self.last_message_id).map_err(|e| RepositoryError::Storage(e.to_string()))
    }

    fn is_unread_for(message: &PendingMessage, room_id: RoomId, reader: UserId) -> bool {
        message.room_id == room_id && message.sender_id != reader && !message.is_read
    }
}

/// インメモリ chat store 実装
///
/// プロセス内でルーム・参加者・未読メッセージを保持します（依存性の逆転）。
#[derive(Default)]
pub struct InMemoryChatStore {
    state: Mutex<StoreState>,
}

impl InMemoryChatStore {
    /// 新しい InMemoryChatStore を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 参加者リストを指定してルームを直接登録
    ///
    /// 既存データの取り込み用。参加者の数や重複は検証しません。
    pub async fn insert_room(
        &self,
        participants: Vec<UserId>,
        at: Timestamp,
    ) -> Result<RoomId, RepositoryError> {
        let mut state = self.state.lock().await;
        let room_id = state.allocate_room_id()?;
        let participants = participants
            .into_iter()
            .map(|user_id| Participant::new(user_id, at))
            .collect();
        state
            .rooms
            .insert(room_id, ChatRoom::new(room_id, participants, at));
        Ok(room_id)
    }

    /// 保持している未読メッセージ数
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.messages.len()
    }
}

#[async_trait]
impl ChatRoomRepository for InMemoryChatStore {
    async fn find_room_with_participants(
        &self,
        room_id: RoomId,
    ) -> Result<ChatRoom, RepositoryError> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(RepositoryError::RoomNotFound(room_id))
    }

    async fn update_room_last_message(
        &self,
        room_id: RoomId,
        content: &MessageContent,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(&room_id)
            .ok_or(RepositoryError::RoomNotFound(room_id))?;
        room.last_message_content = Some(content.as_str().to_string());
        room.last_message_at = Some(at);
        Ok(())
    }

    async fn rooms_for_user(&self, user_id: UserId) -> Result<Vec<ChatRoom>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .rooms
            .values()
            .filter(|room| room.has_participant(user_id))
            .cloned()
            .collect())
    }

    async fn remove_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(&room_id)
            .ok_or(RepositoryError::RoomNotFound(room_id))?;
        let before = room.participants.len();
        room.participants.retain(|p| p.user_id != user_id);
        Ok(room.participants.len() < before)
    }

    async fn find_or_create_private_room(
        &self,
        user_id: UserId,
        target_user_id: UserId,
        at: Timestamp,
    ) -> Result<(RoomId, bool), RepositoryError> {
        if user_id == target_user_id {
            return Err(RepositoryError::InvalidParticipants(format!(
                "user {} cannot chat with themselves",
                user_id
            )));
        }

        let mut state = self.state.lock().await;

        let existing = state.rooms.values().find(|room| {
            room.participants.len() == 2
                && room.has_participant(user_id)
                && room.has_participant(target_user_id)
        });
        if let Some(room) = existing {
            return Ok((room.id, false));
        }

        let room_id = state.allocate_room_id()?;
        let participants = vec![
            Participant::new(user_id, at),
            Participant::new(target_user_id, at),
        ];
        state
            .rooms
            .insert(room_id, ChatRoom::new(room_id, participants, at));
        tracing::debug!(
            "Created private room {} for users {} and {}",
            room_id,
            user_id,
            target_user_id
        );
        Ok((room_id, true))
    }
}

#[async_trait]
impl PendingMessageStore for InMemoryChatStore {
    async fn create_pending_message(
        &self,
        message: NewPendingMessage,
    ) -> Result<PendingMessage, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.rooms.contains_key(&message.room_id) {
            return Err(RepositoryError::RoomNotFound(message.room_id));
        }
        let id = state.allocate_message_id()?;
        let stored = PendingMessage {
            id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content,
            product_info: message.product_info,
            is_read: false,
            created_at: message.created_at,
        };
        state.messages.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_pending_message(
        &self,
        id: MessageId,
    ) -> Result<Option<PendingMessage>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.messages.get(&id).cloned())
    }

    async fn delete_pending_message(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.messages.remove(&id).is_some())
    }

    async fn delete_pending_messages(&self, ids: &[MessageId]) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter(|id| state.messages.remove(*id).is_some())
            .count())
    }

    async fn unread_for_room(
        &self,
        room_id: RoomId,
        reader: UserId,
    ) -> Result<Vec<PendingMessage>, RepositoryError> {
        let state = self.state.lock().await;
        let mut unread: Vec<PendingMessage> = state
            .messages
            .values()
            .filter(|m| StoreState::is_unread_for(m, room_id, reader))
            .cloned()
            .collect();
        unread.sort_by_key(|m| (m.created_at, m.id));
        Ok(unread)
    }

    async fn count_unread_for_room(
        &self,
        room_id: RoomId,
        reader: UserId,
    ) -> Result<usize, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .values()
            .filter(|m| StoreState::is_unread_for(m, room_id, reader))
            .count())
    }

    async fn delete_unread_for_room(
        &self,
        room_id: RoomId,
        reader: UserId,
    ) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().await;
        let before = state.messages.len();
        state
            .messages
            .retain(|_, m| !StoreState::is_unread_for(m, room_id, reader));
        Ok(before - state.messages.len())
    }

    async fn pop_pending_message(
        &self,
        id: MessageId,
    ) -> Result<Option<PendingMessage>, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.messages.remove(&id))
    }
}
