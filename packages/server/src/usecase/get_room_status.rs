//! UseCase: ルームの在室状況取得

use std::sync::Arc;

use crate::{
    domain::{ChatRoomRepository, RoomId, UserId},
    infrastructure::presence::PresenceRegistry,
};

use super::error::RoomAccessError;

/// Presence of one participant as seen from the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantPresence {
    pub user_id: UserId,
    pub is_online: bool,
    pub in_room: bool,
}

/// ルーム在室状況取得のユースケース
pub struct GetRoomStatusUseCase {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    registry: PresenceRegistry,
}

impl GetRoomStatusUseCase {
    pub fn new(chat_rooms: Arc<dyn ChatRoomRepository>, registry: PresenceRegistry) -> Self {
        Self {
            chat_rooms,
            registry,
        }
    }

    /// 参加者ごとのオンライン・在室状況を返す（参加者のみ参照可能）
    pub async fn execute(
        &self,
        caller: UserId,
        room_id: RoomId,
    ) -> Result<Vec<ParticipantPresence>, RoomAccessError> {
        let room = self.chat_rooms.find_room_with_participants(room_id).await?;
        if !room.has_participant(caller) {
            return Err(RoomAccessError::NotParticipant {
                user_id: caller,
                room_id,
            });
        }

        let in_room = self.registry.users_in_room(room_id);
        Ok(room
            .participants
            .iter()
            .map(|p| ParticipantPresence {
                user_id: p.user_id,
                is_online: self.registry.is_user_online(p.user_id),
                in_room: in_room.contains(&p.user_id),
            })
            .collect())
    }
}
