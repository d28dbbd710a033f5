//! Helpers for pushing server events to connections.

use std::sync::Arc;

use crate::{
    domain::{ChatRoom, ChatRoomRepository, RoomId, UserId},
    infrastructure::{dto::websocket::ServerEvent, presence::PresenceRegistry},
};

/// Serialize an event, logging and skipping it when that fails.
pub(crate) fn encode(event: &ServerEvent) -> Option<String> {
    match event.to_json() {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!("Failed to encode server event: {}", e);
            None
        }
    }
}

/// Sends `room_status` events to the other participants of a room.
pub struct RoomStatusNotifier {
    chat_rooms: Arc<dyn ChatRoomRepository>,
    registry: PresenceRegistry,
}

impl RoomStatusNotifier {
    pub fn new(chat_rooms: Arc<dyn ChatRoomRepository>, registry: PresenceRegistry) -> Self {
        Self {
            chat_rooms,
            registry,
        }
    }

    /// Tell the room's other participants whether `user_id` is viewing it.
    ///
    /// Returns the number of connections notified. A failed room lookup is logged and
    /// nobody is notified.
    pub async fn notify(&self, room_id: RoomId, user_id: UserId, in_room: bool) -> usize {
        match self.chat_rooms.find_room_with_participants(room_id).await {
            Ok(room) => self.notify_participants(&room, user_id, in_room),
            Err(e) => {
                tracing::warn!("Skipping room_status for room {}: {}", room_id, e);
                0
            }
        }
    }

    /// Same as [`RoomStatusNotifier::notify`] for a room the caller already loaded.
    pub fn notify_participants(&self, room: &ChatRoom, user_id: UserId, in_room: bool) -> usize {
        let event = ServerEvent::RoomStatus {
            user_id: user_id.value(),
            chat_room_id: room.id.value(),
            in_room,
        };
        let Some(payload) = encode(&event) else {
            return 0;
        };

        room.others(user_id)
            .map(|other| self.registry.send_to_user(other, &payload))
            .sum()
    }
}
