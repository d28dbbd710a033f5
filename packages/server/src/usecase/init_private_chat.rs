//! UseCase: 1 対 1 チャットの開始

use std::sync::Arc;

use lapak_shared::time::Clock;

use crate::domain::{ChatRoomRepository, RoomId, Timestamp, UserId};

use super::error::InitPrivateChatError;

/// 1 対 1 チャット開始のユースケース
pub struct InitPrivateChatUseCase {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    clock: Arc<dyn Clock>,
}

impl InitPrivateChatUseCase {
    pub fn new(chat_rooms: Arc<dyn ChatRoomRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { chat_rooms, clock }
    }

    /// 2 人のルームを探し、なければ作成する
    ///
    /// # Returns
    ///
    /// * `Ok((RoomId, bool))` - ルーム ID と、今回作成したかどうか
    pub async fn execute(
        &self,
        user_id: UserId,
        target_user_id: UserId,
    ) -> Result<(RoomId, bool), InitPrivateChatError> {
        if user_id == target_user_id {
            return Err(InitPrivateChatError::SameUser);
        }

        let now = Timestamp::new(self.clock.now_millis());
        let (room_id, created) = self
            .chat_rooms
            .find_or_create_private_room(user_id, target_user_id, now)
            .await
            .map_err(InitPrivateChatError::Store)?;

        if created {
            tracing::info!(
                "Created private chat room {} for users {} and {}",
                room_id,
                user_id,
                target_user_id
            );
        }
        Ok((room_id, created))
    }
}
